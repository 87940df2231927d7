use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{
    MediaType, WatchHistoryEntry, WatchHistoryKey, WatchProgressFields,
};
use uuid::Uuid;

use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatchHistoryRepository: Send + Sync {
    /// Insert or partially update the record identified by `key`.
    ///
    /// Fields left `None` keep their stored value. `watched_at` becomes the
    /// record's `last_watched_at` unless the stored value is later.
    async fn upsert(
        &self,
        key: &WatchHistoryKey,
        fields: &WatchProgressFields,
        watched_at: DateTime<Utc>,
    ) -> Result<WatchHistoryEntry>;

    async fn get(
        &self,
        key: &WatchHistoryKey,
    ) -> Result<Option<WatchHistoryEntry>>;

    /// Most recently watched first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WatchHistoryEntry>>;

    /// Every record of one title (all episodes for TV), most recent first.
    async fn list_for_title(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<Vec<WatchHistoryEntry>>;

    /// Most recent records that carry a source, newest first.
    async fn recent_with_source(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WatchHistoryEntry>>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool>;

    async fn delete_title(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<u64>;

    async fn clear(&self, user_id: Uuid) -> Result<u64>;
}
