pub mod folders;
pub mod settings;
pub mod users;
pub mod visitor_logs;
pub mod watch_history;
pub mod watchlist;
