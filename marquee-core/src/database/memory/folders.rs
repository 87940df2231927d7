use std::sync::Arc;

use async_trait::async_trait;
use marquee_model::WatchlistFolder;
use uuid::Uuid;

use super::MemoryStore;
use crate::database::ports::folders::FoldersRepository;
use crate::error::{MarqueeError, Result};

#[derive(Debug, Clone)]
pub struct InMemoryFoldersRepository {
    store: Arc<MemoryStore>,
}

impl InMemoryFoldersRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

fn name_taken(
    folders: &std::collections::HashMap<Uuid, WatchlistFolder>,
    user_id: Uuid,
    name: &str,
    except: Option<Uuid>,
) -> bool {
    folders.values().any(|f| {
        f.user_id == user_id && f.name == name && Some(f.id) != except
    })
}

#[async_trait]
impl FoldersRepository for InMemoryFoldersRepository {
    async fn create(&self, folder: &WatchlistFolder) -> Result<()> {
        let mut folders = self.store.folders.write().await;
        if name_taken(&folders, folder.user_id, &folder.name, None) {
            return Err(MarqueeError::Conflict(format!(
                "folder {:?} already exists",
                folder.name
            )));
        }
        folders.insert(folder.id, folder.clone());
        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<WatchlistFolder>> {
        let mut folders: Vec<WatchlistFolder> = self
            .store
            .folders
            .read()
            .await
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(folders)
    }

    async fn get(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WatchlistFolder>> {
        Ok(self
            .store
            .folders
            .read()
            .await
            .get(&id)
            .filter(|f| f.user_id == user_id)
            .cloned())
    }

    async fn rename(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<WatchlistFolder> {
        let mut folders = self.store.folders.write().await;
        if name_taken(&folders, user_id, name, Some(id)) {
            return Err(MarqueeError::Conflict(format!(
                "folder {name:?} already exists"
            )));
        }
        match folders.get_mut(&id) {
            Some(folder) if folder.user_id == user_id => {
                folder.name = name.to_string();
                Ok(folder.clone())
            }
            _ => Err(MarqueeError::NotFound(format!("folder {id}"))),
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut folders = self.store.folders.write().await;
        let owned = folders.get(&id).is_some_and(|f| f.user_id == user_id);
        if !owned {
            return Ok(false);
        }
        folders.remove(&id);
        drop(folders);

        let mut watchlist = self.store.watchlist.write().await;
        for entry in watchlist.values_mut() {
            if entry.folder_id == Some(id) {
                entry.folder_id = None;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::InMemoryWatchlistRepository;
    use crate::database::ports::WatchlistRepository;
    use marquee_model::{MediaType, NewWatchlistEntry, WatchlistEntry};

    #[tokio::test]
    async fn deleting_a_folder_detaches_entries() {
        let store = MemoryStore::new();
        let folders = InMemoryFoldersRepository::new(store.clone());
        let watchlist = InMemoryWatchlistRepository::new(store);
        let user = Uuid::new_v4();

        let folder = WatchlistFolder::new(user, "Weekend");
        folders.create(&folder).await.unwrap();

        let entry = WatchlistEntry::from_new(
            user,
            NewWatchlistEntry {
                media_id: 27205,
                media_type: MediaType::Movie,
                title: "Inception".into(),
                poster_path: None,
                vote_average: Some(8.4),
                folder_id: Some(folder.id),
            },
        );
        watchlist.add(&entry).await.unwrap();

        assert!(folders.delete(user, folder.id).await.unwrap());

        let remaining = watchlist.list(user, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].folder_id, None);
    }

    #[tokio::test]
    async fn names_are_unique_per_user() {
        let folders = InMemoryFoldersRepository::new(MemoryStore::new());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        folders
            .create(&WatchlistFolder::new(alice, "Horror"))
            .await
            .unwrap();
        folders
            .create(&WatchlistFolder::new(bob, "Horror"))
            .await
            .unwrap();
        assert!(matches!(
            folders.create(&WatchlistFolder::new(alice, "Horror")).await,
            Err(MarqueeError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn other_users_cannot_rename_or_delete() {
        let folders = InMemoryFoldersRepository::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let folder = WatchlistFolder::new(owner, "Mine");
        folders.create(&folder).await.unwrap();

        let stranger = Uuid::new_v4();
        assert!(matches!(
            folders.rename(stranger, folder.id, "Theirs").await,
            Err(MarqueeError::NotFound(_))
        ));
        assert!(!folders.delete(stranger, folder.id).await.unwrap());
        assert_eq!(
            folders.rename(owner, folder.id, "Ours").await.unwrap().name,
            "Ours"
        );
    }
}
