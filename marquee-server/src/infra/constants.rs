/// Placeholder secrets. Accepted in dev mode only.
pub const DEFAULT_PASSWORD_PEPPER: &str = "marquee-dev-pepper-change-me";
pub const DEFAULT_TOKEN_KEY: &str = "marquee-dev-token-key-change-me";

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_VISITOR_LOG_RETENTION_DAYS: u64 = 30;
