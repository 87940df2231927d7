pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    AuthConfig, ChatConfig, Config, ConfigMetadata, CorsConfig, DatabaseConfig,
    PlaytimeConfig, RateLimitsConfig, RedisConfig, SecurityConfig,
    ServerConfig, TmdbConfig, VisitorsConfig, parse_rate_limit_rule,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
