pub mod maintenance;
pub mod rate_limit;

pub use maintenance::maintenance_middleware;
pub use rate_limit::{RedisRateLimiter, rate_limit_middleware};
