use async_trait::async_trait;
use marquee_model::WatchlistFolder;
use uuid::Uuid;

use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FoldersRepository: Send + Sync {
    /// Fails with `Conflict` when the user already has a folder of that name.
    async fn create(&self, folder: &WatchlistFolder) -> Result<()>;
    async fn list(&self, user_id: Uuid) -> Result<Vec<WatchlistFolder>>;
    async fn get(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WatchlistFolder>>;
    async fn rename(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<WatchlistFolder>;
    /// Delete the folder and detach its entries.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
}
