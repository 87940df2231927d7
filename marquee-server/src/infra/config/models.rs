use std::path::PathBuf;
use std::time::Duration;

use marquee_core::playback::BatchConfig;
use marquee_core::rate_limit::RateLimitRule;

use crate::infra::constants::{DEFAULT_PASSWORD_PEPPER, DEFAULT_TOKEN_KEY};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub tmdb: TmdbConfig,
    pub chat: ChatConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub rate_limits: RateLimitsConfig,
    pub playtime: PlaytimeConfig,
    pub visitors: VisitorsConfig,
    pub security: SecurityConfig,
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Development defaults: in-memory store, placeholder secrets, no
    /// upstream keys.
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 3000,
            },
            database: DatabaseConfig::default(),
            redis: None,
            tmdb: TmdbConfig::default(),
            chat: ChatConfig::default(),
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            rate_limits: RateLimitsConfig::default(),
            playtime: PlaytimeConfig::default(),
            visitors: VisitorsConfig::default(),
            security: SecurityConfig::default(),
            dev_mode: true,
            metadata: ConfigMetadata::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` runs on the in-memory store.
    pub primary_url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            primary_url: None,
            max_connections: crate::infra::constants::DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub password_pepper: String,
    pub token_key: String,
    pub token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_pepper: DEFAULT_PASSWORD_PEPPER.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            token_ttl: Duration::from_secs(
                crate::infra::constants::DEFAULT_TOKEN_TTL_SECS,
            ),
        }
    }
}

impl AuthConfig {
    pub fn is_default_pepper(&self) -> bool {
        self.password_pepper == DEFAULT_PASSWORD_PEPPER
    }

    pub fn is_default_token_key(&self) -> bool {
        self.token_key == DEFAULT_TOKEN_KEY
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: ["Authorization", "Content-Type"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_credentials: false,
        }
    }
}

impl CorsConfig {
    pub fn is_wildcard_included(&self) -> bool {
        self.allowed_origins
            .iter()
            .any(|origin| origin.trim() == "*")
    }
}

/// Per-class request limits. Chat is the most expensive upstream call and
/// gets the tightest rule.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitsConfig {
    pub chat: RateLimitRule,
    pub search: RateLimitRule,
    pub api: RateLimitRule,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            chat: RateLimitRule::new(20, Duration::from_secs(60)),
            search: RateLimitRule::new(60, Duration::from_secs(60)),
            api: RateLimitRule::new(600, Duration::from_secs(60)),
        }
    }
}

/// Parse a `max/window_secs` rule such as `20/60`.
pub fn parse_rate_limit_rule(raw: &str) -> Option<RateLimitRule> {
    let (max, window) = raw.trim().split_once('/')?;
    let max_requests = max.trim().parse::<u32>().ok()?;
    let window_secs = window.trim().parse::<u64>().ok()?;
    let rule = RateLimitRule::new(max_requests, Duration::from_secs(window_secs));
    rule.validate().ok()?;
    Some(rule)
}

#[derive(Debug, Clone, Copy)]
pub struct PlaytimeConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub unload_timeout: Duration,
}

impl Default for PlaytimeConfig {
    fn default() -> Self {
        let defaults = BatchConfig::default();
        Self {
            batch_size: defaults.max_batch,
            flush_interval: defaults.flush_interval,
            unload_timeout: defaults.unload_timeout,
        }
    }
}

impl From<PlaytimeConfig> for BatchConfig {
    fn from(value: PlaytimeConfig) -> Self {
        BatchConfig {
            max_batch: value.batch_size.max(1),
            flush_interval: value.flush_interval,
            unload_timeout: value.unload_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VisitorsConfig {
    pub retention: Duration,
}

impl Default for VisitorsConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(
                crate::infra::constants::DEFAULT_VISITOR_LOG_RETENTION_DAYS
                    * 86_400,
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Honour `X-Forwarded-For` when identifying clients.
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
