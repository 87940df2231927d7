//! Fixed-window request limiting.
//!
//! Each key owns a window `(count, reset_at)`. The first request, or the
//! first request after the window expired, starts a fresh window with a count
//! of one. Later requests increment the count and are denied once it exceeds
//! the rule's `max_requests`.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Who is being limited.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateLimitKey {
    IpAddress(String),
    UserId(Uuid),
}

impl RateLimitKey {
    /// Storage key namespaced by rule scope, e.g. `chat:user:<uuid>`.
    pub fn to_cache_key(&self, scope: &str) -> String {
        match self {
            RateLimitKey::IpAddress(ip) => format!("{scope}:ip:{ip}"),
            RateLimitKey::UserId(id) => format!("{scope}:user:{id}"),
        }
    }
}

impl Display for RateLimitKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimitKey::IpAddress(ip) => write!(f, "ip:{ip}"),
            RateLimitKey::UserId(id) => write!(f, "user:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn validate(&self) -> RateLimitResult<()> {
        if self.max_requests == 0 {
            return Err(RateLimitError::Config(
                "max_requests must be at least 1".into(),
            ));
        }
        if self.window.is_zero() {
            return Err(RateLimitError::Config(
                "window must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests counted in the current window, including this one.
    pub current_count: u32,
    pub limit: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a request against `key` under `rule` and decide whether it may
    /// proceed.
    async fn check_and_update(
        &self,
        key: &str,
        rule: &RateLimitRule,
    ) -> RateLimitResult<RateLimitDecision>;

    /// Boolean form of [`RateLimiter::check_and_update`].
    async fn allow(
        &self,
        key: &str,
        rule: &RateLimitRule,
    ) -> RateLimitResult<bool> {
        Ok(self.check_and_update(key, rule).await?.allowed)
    }

    async fn reset(&self, key: &str) -> RateLimitResult<()>;

    /// Drop expired windows. Returns how many were removed.
    async fn cleanup_expired(&self) -> RateLimitResult<u64>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Process-local limiter. State is lost on restart and not shared between
/// nodes.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    windows: DashMap<String, Window>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    fn check_at(
        &self,
        key: &str,
        rule: &RateLimitRule,
        now: Instant,
    ) -> RateLimitDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now,
        });
        let window = entry.value_mut();

        if window.count == 0 || now >= window.reset_at {
            window.count = 1;
            window.reset_at = now + rule.window;
        } else {
            window.count = window.count.saturating_add(1);
        }

        RateLimitDecision {
            allowed: window.count <= rule.max_requests,
            current_count: window.count,
            limit: rule.max_requests,
            reset_after: window.reset_at.saturating_duration_since(now),
        }
    }

    fn sweep_at(&self, now: Instant) -> u64 {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at > now);
        before.saturating_sub(self.windows.len()) as u64
    }

    /// Run [`RateLimiter::cleanup_expired`] every `interval` until the handle
    /// is aborted.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Delay,
            );
            loop {
                ticker.tick().await;
                let removed = limiter.sweep_at(Instant::now());
                if removed > 0 {
                    tracing::debug!(
                        removed,
                        remaining = limiter.tracked_keys(),
                        "swept expired rate limit windows"
                    );
                }
            }
        })
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check_and_update(
        &self,
        key: &str,
        rule: &RateLimitRule,
    ) -> RateLimitResult<RateLimitDecision> {
        rule.validate()?;
        let decision = self.check_at(key, rule, Instant::now());
        if !decision.allowed {
            tracing::debug!(
                key,
                count = decision.current_count,
                limit = decision.limit,
                "rate limit exceeded"
            );
        }
        Ok(decision)
    }

    async fn reset(&self, key: &str) -> RateLimitResult<()> {
        self.windows.remove(key);
        Ok(())
    }

    async fn cleanup_expired(&self) -> RateLimitResult<u64> {
        Ok(self.sweep_at(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: RateLimitRule = RateLimitRule::new(5, Duration::from_secs(60));

    #[tokio::test(start_paused = true)]
    async fn sixth_request_in_window_is_denied() {
        let limiter = InMemoryRateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.allow("k", &RULE).await.unwrap());
        }
        let decision = limiter.check_and_update("k", &RULE).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.current_count, 6);
        assert_eq!(decision.limit, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_resets_the_count() {
        let limiter = InMemoryRateLimiter::new();
        for _ in 0..6 {
            limiter.allow("k", &RULE).await.unwrap();
        }
        assert!(!limiter.allow("k", &RULE).await.unwrap());

        tokio::time::advance(Duration::from_secs(60)).await;

        let decision = limiter.check_and_update("k", &RULE).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.current_count, 1);
        assert_eq!(decision.reset_after, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = InMemoryRateLimiter::new();
        for _ in 0..6 {
            limiter.allow("a", &RULE).await.unwrap();
        }
        assert!(limiter.allow("b", &RULE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_drops_only_expired_windows() {
        let limiter = InMemoryRateLimiter::new();
        limiter.allow("old", &RULE).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.allow("fresh", &RULE).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(limiter.cleanup_expired().await.unwrap(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn reset_forgets_the_key() {
        let limiter = InMemoryRateLimiter::new();
        for _ in 0..6 {
            limiter.allow("k", &RULE).await.unwrap();
        }
        limiter.reset("k").await.unwrap();
        assert!(limiter.allow("k", &RULE).await.unwrap());
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let limiter = InMemoryRateLimiter::new();
        let rule = RateLimitRule::new(0, Duration::from_secs(1));
        assert!(matches!(
            limiter.check_and_update("k", &rule).await,
            Err(RateLimitError::Config(_))
        ));
    }

    #[test]
    fn cache_keys_are_scoped() {
        let key = RateLimitKey::IpAddress("10.0.0.1".into());
        assert_eq!(key.to_cache_key("api"), "api:ip:10.0.0.1");
        let user = RateLimitKey::UserId(Uuid::nil());
        assert_eq!(
            user.to_cache_key("chat"),
            format!("chat:user:{}", Uuid::nil())
        );
    }
}
