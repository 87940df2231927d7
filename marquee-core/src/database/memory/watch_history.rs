use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{
    MediaType, WatchHistoryEntry, WatchHistoryKey, WatchProgressFields,
};
use uuid::Uuid;

use super::MemoryStore;
use crate::database::ports::watch_history::WatchHistoryRepository;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct InMemoryWatchHistoryRepository {
    store: Arc<MemoryStore>,
}

impl InMemoryWatchHistoryRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    async fn query<F>(
        &self,
        limit: Option<usize>,
        filter: F,
    ) -> Vec<WatchHistoryEntry>
    where
        F: Fn(&WatchHistoryEntry) -> bool + Send,
    {
        let history = self.store.watch_history.read().await;
        let mut entries: Vec<WatchHistoryEntry> =
            history.values().filter(|e| filter(*e)).cloned().collect();
        entries.sort_by(|a, b| b.last_watched_at.cmp(&a.last_watched_at));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
    }
}

#[async_trait]
impl WatchHistoryRepository for InMemoryWatchHistoryRepository {
    async fn upsert(
        &self,
        key: &WatchHistoryKey,
        fields: &WatchProgressFields,
        watched_at: DateTime<Utc>,
    ) -> Result<WatchHistoryEntry> {
        let mut history = self.store.watch_history.write().await;
        let entry = history
            .entry(*key)
            .and_modify(|entry| entry.apply(fields, watched_at))
            .or_insert_with(|| WatchHistoryEntry::new(key, fields, watched_at));
        Ok(entry.clone())
    }

    async fn get(
        &self,
        key: &WatchHistoryKey,
    ) -> Result<Option<WatchHistoryEntry>> {
        Ok(self.store.watch_history.read().await.get(key).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WatchHistoryEntry>> {
        Ok(self.query(Some(limit), |e| e.user_id == user_id).await)
    }

    async fn list_for_title(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<Vec<WatchHistoryEntry>> {
        Ok(self
            .query(None, |e| {
                e.user_id == user_id
                    && e.media_id == media_id
                    && e.media_type == media_type
            })
            .await)
    }

    async fn recent_with_source(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WatchHistoryEntry>> {
        Ok(self
            .query(Some(limit), |e| {
                e.user_id == user_id && e.source.is_some()
            })
            .await)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut history = self.store.watch_history.write().await;
        let before = history.len();
        history.retain(|_, e| !(e.user_id == user_id && e.id == id));
        Ok(history.len() < before)
    }

    async fn delete_title(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<u64> {
        let mut history = self.store.watch_history.write().await;
        let before = history.len();
        history.retain(|key, _| {
            !(key.user_id == user_id
                && key.media_id == media_id
                && key.media_type == media_type)
        });
        Ok((before - history.len()) as u64)
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64> {
        let mut history = self.store.watch_history.write().await;
        let before = history.len();
        history.retain(|key, _| key.user_id != user_id);
        Ok((before - history.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> InMemoryWatchHistoryRepository {
        InMemoryWatchHistoryRepository::new(MemoryStore::new())
    }

    fn progress(pct: f64) -> WatchProgressFields {
        WatchProgressFields {
            progress: Some(pct),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn movie_upserts_converge_on_one_row() {
        let repo = repo();
        let user = Uuid::new_v4();
        let key = WatchHistoryKey::movie(user, 603);

        let first = repo.upsert(&key, &progress(10.0), Utc::now()).await.unwrap();
        let second =
            repo.upsert(&key, &progress(20.0), Utc::now()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.list_for_user(user, 10).await.unwrap().len(), 1);
        assert_eq!(second.progress, 20.0);
    }

    #[tokio::test]
    async fn episodes_are_distinct_rows() {
        let repo = repo();
        let user = Uuid::new_v4();
        repo.upsert(
            &WatchHistoryKey::episode(user, 1399, 1, 2),
            &progress(50.0),
            Utc::now(),
        )
        .await
        .unwrap();
        repo.upsert(
            &WatchHistoryKey::episode(user, 1399, 1, 3),
            &progress(5.0),
            Utc::now(),
        )
        .await
        .unwrap();

        let rows = repo
            .list_for_title(user, 1399, MediaType::Tv)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn omitted_progress_is_preserved() {
        let repo = repo();
        let key = WatchHistoryKey::movie(Uuid::new_v4(), 1);
        repo.upsert(&key, &progress(75.0), Utc::now()).await.unwrap();

        let updated = repo
            .upsert(
                &key,
                &WatchProgressFields {
                    source: Some("vidlink".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(updated.progress, 75.0);
        assert_eq!(updated.source.as_deref(), Some("vidlink"));
        assert!(updated.source_set_at.is_some());
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner() {
        let repo = repo();
        let owner = Uuid::new_v4();
        let entry = repo
            .upsert(&WatchHistoryKey::movie(owner, 1), &progress(1.0), Utc::now())
            .await
            .unwrap();

        assert!(!repo.delete(Uuid::new_v4(), entry.id).await.unwrap());
        assert!(repo.delete(owner, entry.id).await.unwrap());
        assert_eq!(repo.clear(owner).await.unwrap(), 0);
    }
}
