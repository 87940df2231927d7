use axum::http::{Method, header::HeaderName};
use thiserror::Error;

use super::models::{AuthConfig, Config, CorsConfig};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("authentication secret {field} {reason}")]
    WeakSecret { field: &'static str, reason: String },
    #[error("CORS wildcard origins are not allowed when DEV_MODE is false")]
    DangerousCorsWildcard,
    #[error("invalid CORS configuration: {reason}")]
    InvalidCorsConfig { reason: String },
    #[error(
        "DATABASE_URL is required when DEV_MODE is false; \
         the in-memory store is for development only"
    )]
    MissingDatabase,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if !config.dev_mode {
        enforce_secret(&config.auth)?;
        if config.cors.is_wildcard_included() {
            return Err(ConfigGuardRailError::DangerousCorsWildcard);
        }
        if config.database.primary_url.is_none() {
            return Err(ConfigGuardRailError::MissingDatabase);
        }
    } else if config.database.primary_url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not configured; using the in-memory store",
            "Data is lost on restart. Set DATABASE_URL to persist accounts and history",
        );
    }

    validate_cors(&config.cors)?;

    if config.redis.is_none() {
        warnings.push_with_hint(
            "REDIS_URL not configured; rate limits are tracked per process",
            "Set REDIS_URL to share rate-limit windows between instances",
        );
    }

    if config.tmdb.api_key.is_none() {
        warnings.push_with_hint(
            "TMDB_API_KEY not set; metadata, search and trending routes will return 503",
            "Set TMDB_API_KEY to enable the metadata pass-through",
        );
    }

    if config.chat.api_key.is_none() {
        warnings.push_with_hint(
            "CHAT_API_KEY not set; the chat assistant will return 503",
            "Set CHAT_API_KEY (and optionally CHAT_API_BASE, CHAT_MODEL)",
        );
    }

    if config.cors.allow_credentials && config.cors.is_wildcard_included() {
        warnings.push(
            "CORS credentials allowed alongside wildcard origin; \
             browsers will reject such configuration",
        );
    }

    Ok(warnings)
}

fn enforce_secret(auth: &AuthConfig) -> Result<(), ConfigGuardRailError> {
    const MIN_SECRET_LENGTH: usize = 32;

    if auth.is_default_pepper() {
        return Err(ConfigGuardRailError::WeakSecret {
            field: "AUTH_PASSWORD_PEPPER",
            reason: "uses the default placeholder value".into(),
        });
    }

    if auth.password_pepper.len() < MIN_SECRET_LENGTH {
        return Err(ConfigGuardRailError::WeakSecret {
            field: "AUTH_PASSWORD_PEPPER",
            reason: format!("must be at least {MIN_SECRET_LENGTH} characters"),
        });
    }

    if auth.is_default_token_key() {
        return Err(ConfigGuardRailError::WeakSecret {
            field: "AUTH_TOKEN_KEY",
            reason: "uses the default placeholder value".into(),
        });
    }

    if auth.token_key.len() < MIN_SECRET_LENGTH {
        return Err(ConfigGuardRailError::WeakSecret {
            field: "AUTH_TOKEN_KEY",
            reason: format!("must be at least {MIN_SECRET_LENGTH} characters"),
        });
    }

    Ok(())
}

fn validate_cors(cors: &CorsConfig) -> Result<(), ConfigGuardRailError> {
    if cors.allowed_methods.is_empty() {
        return Err(ConfigGuardRailError::InvalidCorsConfig {
            reason: "at least one HTTP method must be allowed".into(),
        });
    }

    for method in &cors.allowed_methods {
        Method::from_bytes(method.as_bytes()).map_err(|_| {
            ConfigGuardRailError::InvalidCorsConfig {
                reason: format!("invalid HTTP method `{method}`"),
            }
        })?;
    }

    for header in &cors.allowed_headers {
        HeaderName::from_bytes(header.as_bytes()).map_err(|_| {
            ConfigGuardRailError::InvalidCorsConfig {
                reason: format!("invalid header name `{header}`"),
            }
        })?;
    }

    Ok(())
}
