//! Core data model definitions shared across Marquee crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod error;
pub mod media_type;
pub mod settings;
pub mod user;
pub mod visitor;
pub mod watch_history;
pub mod watchlist;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use media_type::MediaType;
pub use settings::{AppSettings, SETTINGS_KEY};
pub use user::{AuthProvider, User, UserRole};
pub use visitor::{ClientInfo, NewVisitorLog, VisitorLog};
pub use watch_history::{
    ProgressKey, WatchHistoryEntry, WatchHistoryKey, WatchProgressFields,
    is_valid_episode,
};
pub use watchlist::{NewWatchlistEntry, WatchlistEntry, WatchlistFolder};
