use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::media_type::MediaType;

/// A saved title. Unique per (user, media, media type).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WatchlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
    pub folder_id: Option<Uuid>,
    pub added_at: DateTime<Utc>,
}

/// Snapshot supplied when saving a title.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NewWatchlistEntry {
    pub media_id: i64,
    pub media_type: MediaType,
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub poster_path: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub vote_average: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub folder_id: Option<Uuid>,
}

impl WatchlistEntry {
    pub fn from_new(user_id: Uuid, new: NewWatchlistEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            media_id: new.media_id,
            media_type: new.media_type,
            title: new.title,
            poster_path: new.poster_path,
            vote_average: new.vote_average,
            folder_id: new.folder_id,
            added_at: Utc::now(),
        }
    }
}

/// User-owned grouping of watchlist entries. Deleting a folder detaches its
/// entries; it never deletes them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WatchlistFolder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl WatchlistFolder {
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}
