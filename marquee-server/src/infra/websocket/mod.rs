pub mod handler;
pub mod rooms;

pub use handler::watch_party_handler;
pub use rooms::WatchPartyRooms;
