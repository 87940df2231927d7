pub mod folders;
pub mod settings;
pub mod users;
pub mod visitor_logs;
pub mod watch_history;
pub mod watchlist;

pub use folders::FoldersRepository;
pub use settings::SettingsRepository;
pub use users::{SourceWrite, SourceWriteOutcome, UsersRepository};
pub use visitor_logs::VisitorLogRepository;
pub use watch_history::WatchHistoryRepository;
pub use watchlist::WatchlistRepository;
