use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::VisitorLog;

use super::MemoryStore;
use crate::database::ports::visitor_logs::VisitorLogRepository;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct InMemoryVisitorLogRepository {
    store: Arc<MemoryStore>,
}

impl InMemoryVisitorLogRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VisitorLogRepository for InMemoryVisitorLogRepository {
    async fn append(&self, log: &VisitorLog) -> Result<()> {
        self.store.visitor_logs.write().await.push(log.clone());
        Ok(())
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<VisitorLog>> {
        let logs = self.store.visitor_logs.read().await;
        let mut sorted: Vec<VisitorLog> = logs.clone();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sorted.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.store.visitor_logs.read().await.len() as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut logs = self.store.visitor_logs.write().await;
        let removed = logs.len() as u64;
        logs.clear();
        Ok(removed)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut logs = self.store.visitor_logs.write().await;
        let before = logs.len();
        logs.retain(|log| log.created_at >= cutoff);
        Ok((before - logs.len()) as u64)
    }
}
