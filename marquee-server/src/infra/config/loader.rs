use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use super::{
    models::{
        AuthConfig, ChatConfig, Config, ConfigMetadata, CorsConfig,
        DatabaseConfig, PlaytimeConfig, RateLimitsConfig, RedisConfig,
        SecurityConfig, ServerConfig, TmdbConfig, VisitorsConfig,
        parse_rate_limit_rule,
    },
    sources::{EnvConfig, FileConfig, FileDatabaseConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};
use crate::infra::constants::{
    DEFAULT_DB_MAX_CONNECTIONS, DEFAULT_PASSWORD_PEPPER, DEFAULT_TOKEN_KEY,
    DEFAULT_TOKEN_TTL_SECS, DEFAULT_VISITOR_LOG_RETENTION_DAYS,
};
use marquee_core::rate_limit::RateLimitRule;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("marquee.toml"),
        PathBuf::from("config/marquee.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();

        let (file_config, config_path, config_present) =
            self.load_file_config(&env_config)?;

        let (config, warnings) = compose_config(
            file_config,
            env_config,
            config_path,
            env_file_loaded,
            config_present,
        )?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>, bool), ConfigLoadError>
    {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        }

        if source.is_empty() {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None, false));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None, false));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path), true))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
    config_present: bool,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if !config_present {
        warnings.push_with_hint(
            "No marquee.toml detected; using environment variables and defaults",
            "Create marquee.toml or set MARQUEE_CONFIG to point at one",
        );
    }

    let FileConfig {
        server: file_server,
        database: file_database,
        redis: file_redis,
        tmdb: file_tmdb,
        chat: file_chat,
        auth: file_auth,
        cors: file_cors,
        rate_limits: file_rate_limits,
        playtime: file_playtime,
        visitors: file_visitors,
        security: file_security,
        dev_mode: file_dev_mode,
    } = file_config.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(3000),
    };

    let database = DatabaseConfig {
        primary_url: resolve_database_url(&env, &file_database)?,
        max_connections: env
            .db_max_connections
            .or(file_database.max_connections)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
    };

    let redis = env
        .redis_url
        .clone()
        .or(file_redis.map(|r| r.url))
        .filter(|url| !url.trim().is_empty())
        .map(|url| RedisConfig { url });

    let tmdb = TmdbConfig {
        api_key: env.tmdb_api_key.clone().or(file_tmdb.api_key),
        base_url: env.tmdb_base_url.clone().or(file_tmdb.base_url),
    };

    let chat = ChatConfig {
        api_key: env.chat_api_key.clone().or(file_chat.api_key),
        api_base: env.chat_api_base.clone().or(file_chat.api_base),
        model: env.chat_model.clone().or(file_chat.model),
    };

    let auth = AuthConfig {
        password_pepper: env
            .auth_password_pepper
            .clone()
            .or(file_auth.password_pepper)
            .unwrap_or_else(|| DEFAULT_PASSWORD_PEPPER.to_string()),
        token_key: env
            .auth_token_key
            .clone()
            .or(file_auth.token_key)
            .unwrap_or_else(|| DEFAULT_TOKEN_KEY.to_string()),
        token_ttl: Duration::from_secs(
            env.auth_token_ttl_secs
                .or(file_auth.token_ttl_secs)
                .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
        ),
    };

    let cors_defaults = CorsConfig::default();
    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .clone()
            .or(file_cors.allowed_origins)
            .unwrap_or(cors_defaults.allowed_origins),
        allowed_methods: file_cors
            .allowed_methods
            .unwrap_or(cors_defaults.allowed_methods),
        allowed_headers: file_cors
            .allowed_headers
            .unwrap_or(cors_defaults.allowed_headers),
        allow_credentials: env
            .cors_allow_credentials
            .or(file_cors.allow_credentials)
            .unwrap_or(cors_defaults.allow_credentials),
    };

    let rate_defaults = RateLimitsConfig::default();
    let rate_limits = RateLimitsConfig {
        chat: rate_rule(
            "RATE_LIMIT_CHAT",
            env.rate_limit_chat.as_deref().or(file_rate_limits.chat.as_deref()),
            rate_defaults.chat,
        )?,
        search: rate_rule(
            "RATE_LIMIT_SEARCH",
            env.rate_limit_search
                .as_deref()
                .or(file_rate_limits.search.as_deref()),
            rate_defaults.search,
        )?,
        api: rate_rule(
            "RATE_LIMIT_API",
            env.rate_limit_api.as_deref().or(file_rate_limits.api.as_deref()),
            rate_defaults.api,
        )?,
    };

    let playtime_defaults = PlaytimeConfig::default();
    let playtime = PlaytimeConfig {
        batch_size: env
            .playtime_batch_size
            .or(file_playtime.batch_size)
            .unwrap_or(playtime_defaults.batch_size),
        flush_interval: env
            .playtime_flush_secs
            .or(file_playtime.flush_secs)
            .map(Duration::from_secs)
            .unwrap_or(playtime_defaults.flush_interval),
        unload_timeout: env
            .playtime_unload_timeout_ms
            .or(file_playtime.unload_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(playtime_defaults.unload_timeout),
    };
    if playtime.batch_size == 0 {
        warnings.push("PLAYTIME_BATCH_SIZE of 0 treated as 1");
    }

    let visitors = VisitorsConfig {
        retention: Duration::from_secs(
            env.visitor_log_retention_days
                .or(file_visitors.retention_days)
                .unwrap_or(DEFAULT_VISITOR_LOG_RETENTION_DAYS)
                .saturating_mul(86_400),
        ),
    };

    let security = SecurityConfig {
        trust_proxy_headers: env
            .trust_proxy_headers
            .or(file_security.trust_proxy_headers)
            .unwrap_or(false),
    };

    let dev_mode = env.dev_mode.or(file_dev_mode).unwrap_or(false);

    let config = Config {
        server,
        database,
        redis,
        tmdb,
        chat,
        auth,
        cors,
        rate_limits,
        playtime,
        visitors,
        security,
        dev_mode,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded,
        },
    };

    warnings.extend(validation::apply_guard_rails(&config)?);

    Ok((config, warnings))
}

fn rate_rule(
    key: &'static str,
    raw: Option<&str>,
    default: RateLimitRule,
) -> Result<RateLimitRule, ConfigLoadError> {
    match raw {
        None => Ok(default),
        Some(value) => parse_rate_limit_rule(value).ok_or_else(|| {
            ConfigLoadError::InvalidRateLimit {
                key,
                value: value.to_string(),
            }
        }),
    }
}

fn resolve_database_url(
    env: &EnvConfig,
    file: &FileDatabaseConfig,
) -> Result<Option<String>, ConfigLoadError> {
    if let Some(url) = &env.database_url {
        return Ok(Some(url.clone()));
    }
    if let Some(path) = &env.database_url_file {
        return read_secret_file(path).map(Some);
    }
    if let Some(url) = file.url.as_ref().filter(|url| !url.trim().is_empty()) {
        return Ok(Some(url.clone()));
    }
    if let Some(path) = &file.url_file {
        return read_secret_file(path).map(Some);
    }
    Ok(None)
}

fn read_secret_file(path: &Path) -> Result<String, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|err| {
        ConfigLoadError::SecretFileIo {
            path: path.to_path_buf(),
            source: err,
        }
    })?;
    Ok(contents.trim().to_string())
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(self, Self::Explicit | Self::Env)
    }
}

impl ConfigPathSource {
    fn is_empty(&self) -> bool {
        self.explicit.is_none() && self.env.is_none()
    }

    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        self.default
            .as_ref()
            .map(|path| (path.clone(), ConfigPathProvenance::Default))
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file not found at {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to read secret file {path}: {source}")]
    SecretFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{key} must look like `max/window_secs`, got `{value}`")]
    InvalidRateLimit { key: &'static str, value: String },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error("failed to load .env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::sources::{
        FileAuthConfig, FilePlaytimeConfig, FileRateLimitsConfig,
        FileServerConfig,
    };
    use std::io::Write;

    fn dev_env() -> EnvConfig {
        EnvConfig {
            dev_mode: Some(true),
            ..EnvConfig::default()
        }
    }

    #[test]
    fn environment_overrides_file_values() {
        let file = FileConfig {
            server: FileServerConfig {
                host: Some("10.0.0.1".into()),
                port: Some(8080),
            },
            rate_limits: FileRateLimitsConfig {
                chat: Some("5/60".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = EnvConfig {
            server_port: Some(9090),
            ..dev_env()
        };

        let (config, _) =
            compose_config(Some(file), env, None, false, true).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.rate_limits.chat.max_requests, 5);
        assert_eq!(
            config.rate_limits.api.max_requests,
            RateLimitsConfig::default().api.max_requests
        );
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let (config, warnings) =
            compose_config(None, dev_env(), None, false, false).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert!(config.database.primary_url.is_none());
        assert!(config.redis.is_none());
        assert_eq!(config.playtime.batch_size, 10);
        assert_eq!(config.visitors.retention, Duration::from_secs(30 * 86_400));
        assert!(
            warnings
                .items
                .iter()
                .any(|w| w.message.starts_with("No marquee.toml"))
        );
    }

    #[test]
    fn malformed_rate_limit_is_rejected() {
        let env = EnvConfig {
            rate_limit_search: Some("lots".into()),
            ..dev_env()
        };
        let err = compose_config(None, env, None, false, false).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidRateLimit {
                key: "RATE_LIMIT_SEARCH",
                ..
            }
        ));
    }

    #[test]
    fn production_without_secrets_fails_guard_rails() {
        let env = EnvConfig {
            database_url: Some("postgres://localhost/marquee".into()),
            ..EnvConfig::default()
        };
        let err = compose_config(None, env, None, false, false).unwrap_err();
        assert!(matches!(err, ConfigLoadError::GuardRail(_)));
    }

    #[test]
    fn database_url_is_read_from_secret_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "postgres://marquee:secret@db/marquee").unwrap();
        let env = EnvConfig {
            database_url_file: Some(file.path().to_path_buf()),
            ..dev_env()
        };
        let (config, _) =
            compose_config(None, env, None, false, false).unwrap();
        assert_eq!(
            config.database.primary_url.as_deref(),
            Some("postgres://marquee:secret@db/marquee")
        );
    }

    #[test]
    fn file_values_fill_playtime_and_auth() {
        let file = FileConfig {
            auth: FileAuthConfig {
                token_ttl_secs: Some(3600),
                ..Default::default()
            },
            playtime: FilePlaytimeConfig {
                batch_size: Some(4),
                flush_secs: Some(2),
                unload_timeout_ms: Some(500),
            },
            ..Default::default()
        };
        let (config, _) =
            compose_config(Some(file), dev_env(), None, false, true).unwrap();
        assert_eq!(config.auth.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.playtime.batch_size, 4);
        assert_eq!(config.playtime.flush_interval, Duration::from_secs(2));
        assert_eq!(config.playtime.unload_timeout, Duration::from_millis(500));
    }

    #[test]
    fn explicit_missing_config_path_is_an_error() {
        let loader = ConfigLoader::new()
            .with_config_path("/definitely/not/here/marquee.toml");
        let err = loader.load_file_config(&EnvConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }
}
