use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::VisitorLog;

use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitorLogRepository: Send + Sync {
    async fn append(&self, log: &VisitorLog) -> Result<()>;
    /// Newest first.
    async fn list(&self, limit: usize, offset: usize)
    -> Result<Vec<VisitorLog>>;
    async fn count(&self) -> Result<u64>;
    async fn delete_all(&self) -> Result<u64>;
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
