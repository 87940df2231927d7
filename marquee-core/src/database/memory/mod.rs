//! In-memory adapters.
//!
//! All repositories share one [`MemoryStore`] so cross-table behavior
//! (cascading user deletion, folder detachment) matches the SQL schema.
//! Nothing is persisted.

mod folders;
mod settings;
mod users;
mod visitor_logs;
mod watch_history;
mod watchlist;

use std::collections::HashMap;
use std::sync::Arc;

use marquee_model::{
    AppSettings, User, VisitorLog, WatchHistoryEntry, WatchHistoryKey,
    WatchlistEntry, WatchlistFolder,
};
use tokio::sync::RwLock;
use uuid::Uuid;

pub use folders::InMemoryFoldersRepository;
pub use settings::InMemorySettingsRepository;
pub use users::InMemoryUsersRepository;
pub use visitor_logs::InMemoryVisitorLogRepository;
pub use watch_history::InMemoryWatchHistoryRepository;
pub use watchlist::InMemoryWatchlistRepository;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    watch_history: RwLock<HashMap<WatchHistoryKey, WatchHistoryEntry>>,
    watchlist: RwLock<HashMap<Uuid, WatchlistEntry>>,
    folders: RwLock<HashMap<Uuid, WatchlistFolder>>,
    settings: RwLock<Option<AppSettings>>,
    visitor_logs: RwLock<Vec<VisitorLog>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}
