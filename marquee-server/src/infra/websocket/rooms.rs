use dashmap::DashMap;
use std::{fmt, sync::Arc};
use tokio::sync::broadcast;
use uuid::Uuid;

const ROOM_CAPACITY: usize = 256;
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Frame relayed inside a room, tagged with the sending connection.
pub type RoomFrame = (Uuid, String);

/// Watch-party rooms. A room is a broadcast channel; members re-broadcast
/// text frames to everyone else in it. Rooms exist only while they have
/// members.
#[derive(Clone, Default)]
pub struct WatchPartyRooms {
    rooms: Arc<DashMap<String, broadcast::Sender<RoomFrame>>>,
}

impl fmt::Debug for WatchPartyRooms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchPartyRooms")
            .field("room_count", &self.rooms.len())
            .finish()
    }
}

/// Membership handle returned by [`WatchPartyRooms::join`].
#[derive(Debug)]
pub struct RoomMembership {
    pub connection_id: Uuid,
    pub sender: broadcast::Sender<RoomFrame>,
    pub receiver: broadcast::Receiver<RoomFrame>,
}

pub fn validate_room_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    let valid = !name.is_empty()
        && name.chars().count() <= MAX_ROOM_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    valid.then(|| name.to_string())
}

impl WatchPartyRooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.rooms
            .get(room)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn join(&self, room: &str) -> RoomMembership {
        let sender = self
            .rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .clone();
        let receiver = sender.subscribe();
        RoomMembership {
            connection_id: Uuid::new_v4(),
            sender,
            receiver,
        }
    }

    /// Drop the room once its last receiver is gone.
    pub fn prune(&self, room: &str) {
        self.rooms.remove_if(room, |_, tx| tx.receiver_count() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names_are_restricted() {
        assert_eq!(validate_room_name(" movie-night "), Some("movie-night".into()));
        assert!(validate_room_name("").is_none());
        assert!(validate_room_name("has space").is_none());
        assert!(validate_room_name(&"a".repeat(MAX_ROOM_NAME_LEN + 1)).is_none());
    }

    #[tokio::test]
    async fn frames_reach_other_members() {
        let rooms = WatchPartyRooms::new();
        let alice = rooms.join("room-1");
        let mut bob = rooms.join("room-1");
        assert_eq!(rooms.member_count("room-1"), 2);

        alice
            .sender
            .send((alice.connection_id, "{\"t\":12}".into()))
            .unwrap();
        let (from, text) = bob.receiver.recv().await.unwrap();
        assert_eq!(from, alice.connection_id);
        assert_eq!(text, "{\"t\":12}");
    }

    #[test]
    fn empty_rooms_are_pruned() {
        let rooms = WatchPartyRooms::new();
        let member = rooms.join("solo");
        rooms.prune("solo");
        assert_eq!(rooms.room_count(), 1);

        drop(member);
        rooms.prune("solo");
        assert_eq!(rooms.room_count(), 0);
    }
}
