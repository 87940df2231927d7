pub mod handlers;
pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, TokenService};
pub use middleware::{
    admin_middleware, auth_middleware, beacon_auth_middleware, optional_auth_middleware,
};
