use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub tmdb: FileTmdbConfig,
    #[serde(default)]
    pub chat: FileChatConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    #[serde(default)]
    pub rate_limits: FileRateLimitsConfig,
    #[serde(default)]
    pub playtime: FilePlaytimeConfig,
    #[serde(default)]
    pub visitors: FileVisitorsConfig,
    #[serde(default)]
    pub security: FileSecurityConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileTmdbConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileChatConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_pepper: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_methods: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<bool>,
}

/// Rules in `max/window_secs` form.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRateLimitsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FilePlaytimeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unload_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileVisitorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSecurityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_proxy_headers: Option<bool>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub database_url_file: Option<PathBuf>,
    pub db_max_connections: Option<u32>,
    pub redis_url: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub tmdb_base_url: Option<String>,
    pub chat_api_key: Option<String>,
    pub chat_api_base: Option<String>,
    pub chat_model: Option<String>,
    pub auth_password_pepper: Option<String>,
    pub auth_token_key: Option<String>,
    pub auth_token_ttl_secs: Option<u64>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub cors_allow_credentials: Option<bool>,
    pub rate_limit_chat: Option<String>,
    pub rate_limit_search: Option<String>,
    pub rate_limit_api: Option<String>,
    pub playtime_batch_size: Option<usize>,
    pub playtime_flush_secs: Option<u64>,
    pub playtime_unload_timeout_ms: Option<u64>,
    pub visitor_log_retention_days: Option<u64>,
    pub dev_mode: Option<bool>,
    pub trust_proxy_headers: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("MARQUEE_CONFIG").ok().map(PathBuf::from),
            server_host: non_empty_var("SERVER_HOST"),
            server_port: parse_var("SERVER_PORT"),
            database_url: non_empty_var("DATABASE_URL"),
            database_url_file: non_empty_var("DATABASE_URL_FILE")
                .map(PathBuf::from),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS"),
            redis_url: non_empty_var("REDIS_URL"),
            tmdb_api_key: non_empty_var("TMDB_API_KEY"),
            tmdb_base_url: non_empty_var("TMDB_BASE_URL"),
            chat_api_key: non_empty_var("CHAT_API_KEY"),
            chat_api_base: non_empty_var("CHAT_API_BASE"),
            chat_model: non_empty_var("CHAT_MODEL"),
            auth_password_pepper: non_empty_var("AUTH_PASSWORD_PEPPER"),
            auth_token_key: non_empty_var("AUTH_TOKEN_KEY"),
            auth_token_ttl_secs: parse_var("AUTH_TOKEN_TTL_SECS"),
            cors_allowed_origins: parse_csv_var("CORS_ALLOWED_ORIGINS"),
            cors_allow_credentials: parse_bool_var("CORS_ALLOW_CREDENTIALS"),
            rate_limit_chat: non_empty_var("RATE_LIMIT_CHAT"),
            rate_limit_search: non_empty_var("RATE_LIMIT_SEARCH"),
            rate_limit_api: non_empty_var("RATE_LIMIT_API"),
            playtime_batch_size: parse_var("PLAYTIME_BATCH_SIZE"),
            playtime_flush_secs: parse_var("PLAYTIME_FLUSH_SECS"),
            playtime_unload_timeout_ms: parse_var("PLAYTIME_UNLOAD_TIMEOUT_MS"),
            visitor_log_retention_days: parse_var("VISITOR_LOG_RETENTION_DAYS"),
            dev_mode: parse_bool_var("DEV_MODE"),
            trust_proxy_headers: parse_bool_var("TRUST_PROXY_HEADERS"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    non_empty_var(name).and_then(|raw| raw.parse().ok())
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| split_csv(&raw))
}

pub(crate) fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| parse_bool(&raw))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_and_bool_parsing() {
        assert_eq!(
            split_csv(" https://a.example , ,https://b.example"),
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn file_config_parses_sections() {
        let raw = r#"
            dev_mode = true

            [server]
            port = 8080

            [rate_limits]
            chat = "5/60"

            [playtime]
            batch_size = 4
        "#;
        let parsed: FileConfig = toml::from_str(raw).unwrap();
        assert_eq!(parsed.server.port, Some(8080));
        assert_eq!(parsed.rate_limits.chat.as_deref(), Some("5/60"));
        assert_eq!(parsed.playtime.batch_size, Some(4));
        assert_eq!(parsed.dev_mode, Some(true));
        assert!(parsed.redis.is_none());
    }
}
