use async_trait::async_trait;
use marquee_model::{MediaType, WatchlistEntry};
use uuid::Uuid;

use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    /// Save a title. Fails with `Conflict` when already saved and with
    /// `NotFound` when `folder_id` names a folder the user does not own.
    async fn add(&self, entry: &WatchlistEntry) -> Result<()>;

    /// Newest first. `folder_id` narrows to a single folder.
    async fn list(
        &self,
        user_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<WatchlistEntry>>;

    async fn get(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<Option<WatchlistEntry>>;

    async fn remove(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<bool>;

    /// Move an entry into `folder_id`, or out of any folder with `None`.
    async fn move_to_folder(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<WatchlistEntry>;
}
