//! # Marquee Server
//!
//! HTTP back end for the Marquee streaming front end. Accounts, watchlists,
//! watch history and the last-used-source preference live here; media bytes
//! never do. Playback heartbeats are coalesced by the playtime batch writer
//! from `marquee-core` before they reach the database.

pub mod handlers;
pub mod infra;
pub mod routes;
pub mod users;

pub use infra::app_state::AppState;
pub use infra::config::{Config, ConfigLoad, ConfigLoader};
pub use routes::{create_api_router, create_app};
