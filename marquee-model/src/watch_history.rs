//! Watch-history records and their compound identity.
//!
//! A record is identified by (user, media, media type, season, episode).
//! Season and episode are absent for movies; two movie records for the same
//! user and media therefore share a key, while TV records differing only in
//! episode do not.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ModelError;
use crate::media_type::MediaType;

/// Season 0 holds specials; episodes count from 1.
pub const fn is_valid_episode(season: i32, episode: i32) -> bool {
    season >= 0 && episode >= 1
}

/// Identity of a watch-history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WatchHistoryKey {
    pub user_id: Uuid,
    pub media_id: i64,
    pub media_type: MediaType,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
}

impl WatchHistoryKey {
    /// Build a key, normalizing coordinates.
    ///
    /// Movies never carry season/episode numbers (any supplied values are
    /// dropped). TV keys must carry both or neither.
    pub fn new(
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
        season_number: Option<i32>,
        episode_number: Option<i32>,
    ) -> Result<Self, ModelError> {
        if media_id <= 0 {
            return Err(ModelError::InvalidEpisodeKey(format!(
                "media id must be positive, got {media_id}"
            )));
        }

        let (season_number, episode_number) = match media_type {
            MediaType::Movie => (None, None),
            MediaType::Tv => match (season_number, episode_number) {
                (Some(s), Some(e)) if is_valid_episode(s, e) => (Some(s), Some(e)),
                (None, None) => (None, None),
                (Some(_), Some(_)) => {
                    return Err(ModelError::InvalidEpisodeKey(
                        "season must be 0 or more and episode 1 or more".into(),
                    ));
                }
                _ => {
                    return Err(ModelError::InvalidEpisodeKey(
                        "season and episode must be supplied together".into(),
                    ));
                }
            },
        };

        Ok(Self {
            user_id,
            media_id,
            media_type,
            season_number,
            episode_number,
        })
    }

    pub fn movie(user_id: Uuid, media_id: i64) -> Self {
        Self {
            user_id,
            media_id,
            media_type: MediaType::Movie,
            season_number: None,
            episode_number: None,
        }
    }

    pub fn episode(
        user_id: Uuid,
        media_id: i64,
        season_number: i32,
        episode_number: i32,
    ) -> Self {
        Self {
            user_id,
            media_id,
            media_type: MediaType::Tv,
            season_number: Some(season_number),
            episode_number: Some(episode_number),
        }
    }

    /// Title-level key used to coalesce queued playtime updates.
    pub fn progress_key(&self) -> ProgressKey {
        ProgressKey {
            user_id: self.user_id,
            media_id: self.media_id,
            media_type: self.media_type,
        }
    }
}

/// Title-level identity (no episode coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressKey {
    pub user_id: Uuid,
    pub media_id: i64,
    pub media_type: MediaType,
}

/// Partial update applied by an upsert. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct WatchProgressFields {
    pub current_time: Option<f64>,
    pub total_duration: Option<f64>,
    /// Percent watched, 0..=100.
    pub progress: Option<f64>,
    pub total_played_seconds: Option<f64>,
    pub finished: Option<bool>,
    /// Raw source identifier as reported by the player.
    pub source: Option<String>,
    pub title: Option<String>,
    pub poster_path: Option<String>,
}

impl WatchProgressFields {
    /// Overlay `other` on top of `self`, keeping current values where `other`
    /// is silent.
    pub fn merged_with(&self, other: &WatchProgressFields) -> Self {
        Self {
            current_time: other.current_time.or(self.current_time),
            total_duration: other.total_duration.or(self.total_duration),
            progress: other.progress.or(self.progress),
            total_played_seconds: other
                .total_played_seconds
                .or(self.total_played_seconds),
            finished: other.finished.or(self.finished),
            source: other.source.clone().or_else(|| self.source.clone()),
            title: other.title.clone().or_else(|| self.title.clone()),
            poster_path: other
                .poster_path
                .clone()
                .or_else(|| self.poster_path.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WatchHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_id: i64,
    pub media_type: MediaType,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub current_time: f64,
    pub total_duration: f64,
    pub progress: f64,
    pub total_played_seconds: f64,
    pub finished: bool,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub source: Option<String>,
    pub source_set_at: Option<DateTime<Utc>>,
    pub last_watched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl WatchHistoryEntry {
    /// Fresh record for `key` with `fields` applied over zeroed progress.
    pub fn new(
        key: &WatchHistoryKey,
        fields: &WatchProgressFields,
        watched_at: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4(),
            user_id: key.user_id,
            media_id: key.media_id,
            media_type: key.media_type,
            season_number: key.season_number,
            episode_number: key.episode_number,
            current_time: 0.0,
            total_duration: 0.0,
            progress: 0.0,
            total_played_seconds: 0.0,
            finished: false,
            title: None,
            poster_path: None,
            source: None,
            source_set_at: None,
            last_watched_at: watched_at,
            created_at: watched_at,
        };
        entry.apply(fields, watched_at);
        entry
    }

    pub fn key(&self) -> WatchHistoryKey {
        WatchHistoryKey {
            user_id: self.user_id,
            media_id: self.media_id,
            media_type: self.media_type,
            season_number: self.season_number,
            episode_number: self.episode_number,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(
        &mut self,
        fields: &WatchProgressFields,
        watched_at: DateTime<Utc>,
    ) {
        if let Some(v) = fields.current_time {
            self.current_time = v;
        }
        if let Some(v) = fields.total_duration {
            self.total_duration = v;
        }
        if let Some(v) = fields.progress {
            self.progress = v;
        }
        if let Some(v) = fields.total_played_seconds {
            self.total_played_seconds = v;
        }
        if let Some(v) = fields.finished {
            self.finished = v;
        }
        if let Some(title) = &fields.title {
            self.title = Some(title.clone());
        }
        if let Some(poster) = &fields.poster_path {
            self.poster_path = Some(poster.clone());
        }
        if let Some(source) = &fields.source {
            self.source = Some(source.clone());
            self.source_set_at = Some(watched_at);
        }
        if watched_at > self.last_watched_at {
            self.last_watched_at = watched_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_keys_drop_episode_coordinates() {
        let user = Uuid::new_v4();
        let key =
            WatchHistoryKey::new(user, 42, MediaType::Movie, Some(1), Some(2))
                .unwrap();
        assert_eq!(key, WatchHistoryKey::movie(user, 42));
    }

    #[test]
    fn tv_keys_require_both_coordinates() {
        let user = Uuid::new_v4();
        assert!(
            WatchHistoryKey::new(user, 7, MediaType::Tv, Some(1), None)
                .is_err()
        );
        assert!(
            WatchHistoryKey::new(user, 7, MediaType::Tv, None, None).is_ok()
        );
        assert_ne!(
            WatchHistoryKey::episode(user, 7, 1, 2),
            WatchHistoryKey::episode(user, 7, 1, 3)
        );
    }

    #[test]
    fn specials_season_is_allowed_but_episode_zero_is_not() {
        let user = Uuid::new_v4();
        assert!(
            WatchHistoryKey::new(user, 7, MediaType::Tv, Some(0), Some(1))
                .is_ok()
        );
        assert!(
            WatchHistoryKey::new(user, 7, MediaType::Tv, Some(1), Some(0))
                .is_err()
        );
        assert!(
            WatchHistoryKey::new(user, 7, MediaType::Tv, Some(-1), Some(1))
                .is_err()
        );
    }

    #[test]
    fn apply_preserves_omitted_progress() {
        let key = WatchHistoryKey::movie(Uuid::new_v4(), 1);
        let now = Utc::now();
        let mut entry = WatchHistoryEntry::new(
            &key,
            &WatchProgressFields {
                progress: Some(40.0),
                current_time: Some(400.0),
                ..Default::default()
            },
            now,
        );

        entry.apply(
            &WatchProgressFields {
                current_time: Some(500.0),
                ..Default::default()
            },
            now,
        );

        assert_eq!(entry.progress, 40.0);
        assert_eq!(entry.current_time, 500.0);
    }
}
