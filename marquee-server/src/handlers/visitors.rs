use std::net::SocketAddr;

use axum::{
    Extension, Json,
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, header},
};
use marquee_core::visitors::parse_user_agent;
use marquee_model::{NewVisitorLog, User, VisitorLog};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::infra::{app_state::AppState, errors::ApiResponse};
use crate::infra::middleware::rate_limit::client_ip;

const MAX_BODY_BYTES: usize = 16 * 1024;
const MAX_FIELD_LEN: usize = 2048;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VisitPayload {
    pub url: Option<String>,
    pub referer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VisitLogged {
    pub logged: bool,
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn clip(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().chars().take(MAX_FIELD_LEN).collect::<String>())
        .filter(|v| !v.is_empty())
}

/// Record a page visit. Always answers 200; logging failures are only
/// traced.
pub async fn log_visit(
    State(state): State<AppState>,
    user: Option<Extension<User>>,
    request: Request,
) -> Json<ApiResponse<VisitLogged>> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let headers = request.headers().clone();

    let payload = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) if !body.is_empty() => {
            serde_json::from_slice::<VisitPayload>(&body).unwrap_or_else(|err| {
                debug!(error = %err, "ignoring malformed visit payload");
                VisitPayload::default()
            })
        }
        Ok(_) => VisitPayload::default(),
        Err(err) => {
            debug!(error = %err, "visit payload unreadable");
            VisitPayload::default()
        }
    };

    let user_agent = header_str(&headers, header::USER_AGENT).unwrap_or_default();
    let new = NewVisitorLog {
        ip: client_ip(&headers, peer, state.config.security.trust_proxy_headers),
        client: parse_user_agent(&user_agent),
        user_agent: user_agent.chars().take(MAX_FIELD_LEN).collect(),
        url: clip(payload.url),
        referer: clip(payload.referer.or_else(|| header_str(&headers, header::REFERER))),
        user_id: user.map(|Extension(user)| user.id),
    };

    let logged = match state
        .unit_of_work
        .visitor_logs
        .append(&VisitorLog::from_new(new))
        .await
    {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "failed to record visit");
            false
        }
    };

    Json(ApiResponse::success(VisitLogged { logged }))
}
