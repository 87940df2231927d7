use std::sync::Arc;

use async_trait::async_trait;
use marquee_model::{MediaType, WatchlistEntry};
use uuid::Uuid;

use super::MemoryStore;
use crate::database::ports::watchlist::WatchlistRepository;
use crate::error::{MarqueeError, Result};

#[derive(Debug, Clone)]
pub struct InMemoryWatchlistRepository {
    store: Arc<MemoryStore>,
}

impl InMemoryWatchlistRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    async fn ensure_folder(
        &self,
        user_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<()> {
        let Some(folder_id) = folder_id else {
            return Ok(());
        };
        let folders = self.store.folders.read().await;
        match folders.get(&folder_id) {
            Some(folder) if folder.user_id == user_id => Ok(()),
            _ => Err(MarqueeError::NotFound(format!("folder {folder_id}"))),
        }
    }
}

#[async_trait]
impl WatchlistRepository for InMemoryWatchlistRepository {
    async fn add(&self, entry: &WatchlistEntry) -> Result<()> {
        self.ensure_folder(entry.user_id, entry.folder_id).await?;
        let mut watchlist = self.store.watchlist.write().await;
        let exists = watchlist.values().any(|existing| {
            existing.user_id == entry.user_id
                && existing.media_id == entry.media_id
                && existing.media_type == entry.media_type
        });
        if exists {
            return Err(MarqueeError::Conflict(format!(
                "{} {} is already on the watchlist",
                entry.media_type, entry.media_id
            )));
        }
        watchlist.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<WatchlistEntry>> {
        let watchlist = self.store.watchlist.read().await;
        let mut entries: Vec<WatchlistEntry> = watchlist
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| folder_id.is_none() || e.folder_id == folder_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(entries)
    }

    async fn get(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<Option<WatchlistEntry>> {
        Ok(self
            .store
            .watchlist
            .read()
            .await
            .values()
            .find(|e| {
                e.user_id == user_id
                    && e.media_id == media_id
                    && e.media_type == media_type
            })
            .cloned())
    }

    async fn remove(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<bool> {
        let mut watchlist = self.store.watchlist.write().await;
        let before = watchlist.len();
        watchlist.retain(|_, e| {
            !(e.user_id == user_id
                && e.media_id == media_id
                && e.media_type == media_type)
        });
        Ok(watchlist.len() < before)
    }

    async fn move_to_folder(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<WatchlistEntry> {
        self.ensure_folder(user_id, folder_id).await?;
        let mut watchlist = self.store.watchlist.write().await;
        match watchlist.get_mut(&entry_id) {
            Some(entry) if entry.user_id == user_id => {
                entry.folder_id = folder_id;
                Ok(entry.clone())
            }
            _ => Err(MarqueeError::NotFound(format!(
                "watchlist entry {entry_id}"
            ))),
        }
    }
}
