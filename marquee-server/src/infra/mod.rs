pub mod app_state;
pub mod config;
pub mod constants;
pub mod errors;
pub mod middleware;
pub mod websocket;
