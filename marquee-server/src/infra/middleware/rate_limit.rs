//! Request limiting layer and its Redis store.
//!
//! Requests are classed by path: chat, metadata search, or any other API
//! call. Authenticated callers are keyed by user id, everyone else by client
//! address. Limiter failures let the request through.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode, header::RETRY_AFTER,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};

use crate::infra::{app_state::AppState, config::RateLimitsConfig, errors::ApiResponse};
use crate::users::auth::middleware::bearer_token;
use marquee_core::rate_limit::{
    RateLimitDecision, RateLimitError, RateLimitKey, RateLimitResult,
    RateLimitRule, RateLimiter,
};

const KEY_PREFIX: &str = "marquee:rl:";

/// Fixed window: INCR, arm the expiry on the first hit, report the count and
/// the remaining window in milliseconds.
const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Limiter shared by every node pointed at the same Redis.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    script: redis::Script,
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter").finish_non_exhaustive()
    }
}

impl RedisRateLimiter {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            script: redis::Script::new(FIXED_WINDOW_SCRIPT),
        })
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check_and_update(
        &self,
        key: &str,
        rule: &RateLimitRule,
    ) -> RateLimitResult<RateLimitDecision> {
        rule.validate()?;
        let window_ms = u64::try_from(rule.window.as_millis()).unwrap_or(u64::MAX);
        let mut conn = self.conn.clone();

        let reply: Vec<i64> = self
            .script
            .key(format!("{KEY_PREFIX}{key}"))
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        let (count, ttl_ms) = match reply.as_slice() {
            [count, ttl_ms] => (*count, *ttl_ms),
            _ => {
                return Err(RateLimitError::Backend(format!(
                    "unexpected script reply: {reply:?}"
                )));
            }
        };
        let current_count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);

        Ok(RateLimitDecision {
            allowed: current_count <= rule.max_requests,
            current_count,
            limit: rule.max_requests,
            reset_after: Duration::from_millis(u64::try_from(ttl_ms.max(0)).unwrap_or(0)),
        })
    }

    async fn reset(&self, key: &str) -> RateLimitResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(format!("{KEY_PREFIX}{key}"))
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))
    }

    /// Redis expires windows on its own.
    async fn cleanup_expired(&self) -> RateLimitResult<u64> {
        Ok(0)
    }
}

/// Which rule a request path falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Chat,
    Search,
    Api,
}

impl RequestClass {
    pub fn classify(path: &str) -> Option<Self> {
        let rest = path.strip_prefix("/api")?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        if rest.starts_with("/chat") {
            Some(RequestClass::Chat)
        } else if rest.starts_with("/search")
            || rest.starts_with("/metadata")
            || rest.starts_with("/trending")
        {
            Some(RequestClass::Search)
        } else {
            Some(RequestClass::Api)
        }
    }

    pub fn scope(&self) -> &'static str {
        match self {
            RequestClass::Chat => "chat",
            RequestClass::Search => "search",
            RequestClass::Api => "api",
        }
    }

    pub fn rule(&self, limits: &RateLimitsConfig) -> RateLimitRule {
        match self {
            RequestClass::Chat => limits.chat,
            RequestClass::Search => limits.search,
            RequestClass::Api => limits.api,
        }
    }
}

/// Client address: the first `X-Forwarded-For` hop when proxies are trusted,
/// otherwise the socket peer.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers
        && let Some(forwarded) = headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    {
        return forwarded.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn retry_after_secs(reset_after: Duration) -> u64 {
    reset_after.as_secs_f64().ceil().max(1.0) as u64
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(class) = RequestClass::classify(req.uri().path()) else {
        return next.run(req).await;
    };
    let rule = class.rule(&state.config.rate_limits);

    let user_id = bearer_token(req.headers())
        .and_then(|token| state.tokens.validate(token).ok())
        .map(|claims| claims.sub);
    let key = match user_id {
        Some(id) => RateLimitKey::UserId(id),
        None => {
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            RateLimitKey::IpAddress(client_ip(
                req.headers(),
                peer,
                state.config.security.trust_proxy_headers,
            ))
        }
    };

    let decision = match state
        .rate_limiter
        .check_and_update(&key.to_cache_key(class.scope()), &rule)
        .await
    {
        Ok(decision) => decision,
        Err(err) => {
            warn!(
                error = %err,
                scope = class.scope(),
                "rate limiter unavailable, allowing request"
            );
            return next.run(req).await;
        }
    };

    if !decision.allowed {
        debug!(%key, scope = class.scope(), count = decision.current_count, "rate limit exceeded");
        let retry_after = retry_after_secs(decision.reset_after);
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::error(format!(
                "Too many requests, retry in {retry_after}s"
            ))),
        )
            .into_response();
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        apply_limit_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(req).await;
    apply_limit_headers(response.headers_mut(), &decision);
    response
}

fn apply_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let reset = SystemTime::now()
        .checked_add(decision.reset_after)
        .unwrap_or_else(SystemTime::now)
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.limit.saturating_sub(decision.current_count)),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(reset),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_classified() {
        assert_eq!(RequestClass::classify("/api/chat"), Some(RequestClass::Chat));
        assert_eq!(
            RequestClass::classify("/api/search?q=alien"),
            Some(RequestClass::Search)
        );
        assert_eq!(
            RequestClass::classify("/api/metadata/movie/550"),
            Some(RequestClass::Search)
        );
        assert_eq!(
            RequestClass::classify("/api/watchlist"),
            Some(RequestClass::Api)
        );
        assert_eq!(RequestClass::classify("/apix"), None);
        assert_eq!(RequestClass::classify("/"), None);
    }

    #[test]
    fn forwarded_for_is_honoured_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer), true), "203.0.113.7");
        assert_eq!(client_ip(&headers, Some(peer), false), "10.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "unknown");
    }

    #[test]
    fn retry_after_rounds_up_to_whole_seconds() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
