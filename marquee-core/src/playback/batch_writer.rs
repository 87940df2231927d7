//! Coalescing write queue for playtime updates.
//!
//! Players report progress every few seconds. Writing each report straight
//! to the database is wasteful, so reports are queued and flushed either
//! when the queue reaches `max_batch` items or when the flush timer fires.
//! A flush coalesces the queue so each title is written once, using the last
//! reported values. Writes that failed on a persistence error stay queued
//! for the next flush; any other error drops the update.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use marquee_model::{ProgressKey, WatchHistoryKey, WatchProgressFields};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::database::ports::WatchHistoryRepository;
use crate::error::MarqueeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Queue length that triggers an immediate flush.
    pub max_batch: usize,
    /// Delay between the first queued update and the timed flush.
    pub flush_interval: Duration,
    /// Upper bound for [`PlaytimeBatchWriter::flush_all`].
    pub unload_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch: 10,
            flush_interval: Duration::from_secs(10),
            unload_timeout: Duration::from_millis(3000),
        }
    }
}

/// One progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaytimeUpdate {
    pub key: WatchHistoryKey,
    pub fields: WatchProgressFields,
}

impl PlaytimeUpdate {
    pub fn new(key: WatchHistoryKey, fields: WatchProgressFields) -> Self {
        Self { key, fields }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Distinct titles written in this flush.
    pub attempted: usize,
    pub persisted: usize,
    /// Updates kept queued for a retry.
    pub failed: usize,
    /// Updates that can never succeed, such as those for deleted users.
    pub dropped: usize,
    /// Queue length once the flush finished.
    pub remaining_depth: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlushError {
    #[error("flush did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("{failed} updates failed to persist, {remaining} still queued")]
    Incomplete { failed: usize, remaining: usize },
}

#[derive(Default)]
struct QueueState {
    queue: Vec<PlaytimeUpdate>,
    timer: Option<(u64, JoinHandle<()>)>,
    timer_generation: u64,
}

struct Inner {
    repo: Arc<dyn WatchHistoryRepository>,
    config: BatchConfig,
    state: Mutex<QueueState>,
    flush_lock: Mutex<()>,
}

#[derive(Clone)]
pub struct PlaytimeBatchWriter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PlaytimeBatchWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaytimeBatchWriter")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Collapse queued updates to one per title, keeping queue order of first
/// appearance. Later updates win; fields a later update omits are inherited
/// from earlier updates for the same episode.
fn coalesce(updates: Vec<PlaytimeUpdate>) -> Vec<PlaytimeUpdate> {
    let mut order: Vec<ProgressKey> = Vec::new();
    let mut latest: HashMap<ProgressKey, PlaytimeUpdate> = HashMap::new();

    for update in updates {
        let progress_key = update.key.progress_key();
        match latest.get_mut(&progress_key) {
            Some(existing) if existing.key == update.key => {
                existing.fields = existing.fields.merged_with(&update.fields);
            }
            Some(existing) => *existing = update,
            None => {
                order.push(progress_key);
                latest.insert(progress_key, update);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| latest.remove(&key))
        .collect()
}

impl PlaytimeBatchWriter {
    pub fn new(repo: Arc<dyn WatchHistoryRepository>, config: BatchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                config,
                state: Mutex::new(QueueState::default()),
                flush_lock: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.inner.config
    }

    pub async fn queue_depth(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    /// Queue an update. Returns the queue depth after the update was
    /// accepted (and after the flush it may have triggered).
    pub async fn enqueue(&self, update: PlaytimeUpdate) -> usize {
        let flush_now = {
            let mut state = self.inner.state.lock().await;
            state.queue.push(update);
            if state.queue.len() >= self.inner.config.max_batch {
                true
            } else {
                self.arm_timer(&mut state);
                false
            }
        };

        if flush_now {
            self.flush().await.remaining_depth
        } else {
            self.queue_depth().await
        }
    }

    /// Write every queued update. Flushes never overlap; a caller arriving
    /// while another flush runs waits for it and then flushes whatever is
    /// left.
    pub async fn flush(&self) -> FlushReport {
        let _flushing = self.inner.flush_lock.lock().await;

        let snapshot = {
            let mut state = self.inner.state.lock().await;
            if let Some((_, timer)) = state.timer.take() {
                timer.abort();
            }
            std::mem::take(&mut state.queue)
        };

        if snapshot.is_empty() {
            return FlushReport::default();
        }

        let batch = coalesce(snapshot);
        let flushed_at = Utc::now();
        let repo = &self.inner.repo;

        let results = join_all(batch.into_iter().map(|update| async move {
            let result = repo.upsert(&update.key, &update.fields, flushed_at).await;
            (update, result)
        }))
        .await;

        let attempted = results.len();
        let mut failed = Vec::new();
        let mut dropped = 0;
        for (update, result) in results {
            match result {
                Ok(_) => {}
                Err(err @ MarqueeError::Persistence(_)) => {
                    warn!(
                        user_id = %update.key.user_id,
                        media_id = update.key.media_id,
                        error = %err,
                        "playtime upsert failed, keeping update queued"
                    );
                    failed.push(update);
                }
                Err(err) => {
                    warn!(
                        user_id = %update.key.user_id,
                        media_id = update.key.media_id,
                        error = %err,
                        "playtime upsert rejected, dropping update"
                    );
                    dropped += 1;
                }
            }
        }
        let failed_count = failed.len();

        let remaining_depth = {
            let mut state = self.inner.state.lock().await;
            // Failed updates go ahead of anything queued during the flush so
            // newer reports still win when coalesced.
            state.queue.splice(0..0, failed);
            if !state.queue.is_empty() {
                self.arm_timer(&mut state);
            }
            state.queue.len()
        };

        if failed_count > 0 || dropped > 0 {
            warn!(
                queue_depth = remaining_depth,
                failed = failed_count,
                dropped,
                "playtime flush incomplete"
            );
        } else {
            debug!(
                persisted = attempted,
                queue_depth = remaining_depth,
                "playtime flush complete"
            );
        }

        FlushReport {
            attempted,
            persisted: attempted - failed_count - dropped,
            failed: failed_count,
            dropped,
            remaining_depth,
        }
    }

    /// Drain the queue within the configured unload timeout.
    pub async fn flush_all(&self) -> Result<FlushReport, FlushError> {
        let timeout = self.inner.config.unload_timeout;
        let report = tokio::time::timeout(timeout, self.flush())
            .await
            .map_err(|_| FlushError::TimedOut(timeout))?;

        if report.failed > 0 {
            return Err(FlushError::Incomplete {
                failed: report.failed,
                remaining: report.remaining_depth,
            });
        }
        Ok(report)
    }

    /// Run [`Self::flush_all`] as a detached task and hand its outcome to
    /// `callback`.
    pub fn flush_in_background<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<FlushReport, FlushError>) + Send + 'static,
    {
        let writer = self.clone();
        tokio::spawn(async move {
            callback(writer.flush_all().await);
        })
    }

    fn arm_timer(&self, state: &mut QueueState) {
        if state.timer.is_some() {
            return;
        }
        state.timer_generation += 1;
        let generation = state.timer_generation;
        let writer = self.clone();
        let delay = self.inner.config.flush_interval;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            writer.on_timer(generation).await;
        });
        state.timer = Some((generation, handle));
    }

    async fn on_timer(&self, generation: u64) {
        {
            let mut state = self.inner.state.lock().await;
            if !matches!(state.timer, Some((armed, _)) if armed == generation) {
                return;
            }
            // Drop our own handle so flush() does not abort this task.
            state.timer = None;
        }
        self.flush().await;
    }
}
