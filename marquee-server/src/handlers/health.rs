use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::infra::{app_state::AppState, errors::ApiResponse};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    /// `postgres` or `memory`.
    pub store: &'static str,
    pub database_ok: bool,
    pub metadata_configured: bool,
    pub chat_configured: bool,
    pub playtime_queue_depth: usize,
    pub watch_party_rooms: usize,
}

pub async fn health(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthReport>>) {
    let (store, database_ok) = match &state.postgres {
        Some(db) => {
            let ok = match sqlx::query("SELECT 1").execute(db.pool()).await {
                Ok(_) => true,
                Err(err) => {
                    warn!(error = %err, "health check query failed");
                    false
                }
            };
            ("postgres", ok)
        }
        None => ("memory", true),
    };

    let report = HealthReport {
        status: if database_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store,
        database_ok,
        metadata_configured: state.metadata.is_some(),
        chat_configured: state.chat.is_some(),
        playtime_queue_depth: state.playtime.queue_depth().await,
        watch_party_rooms: state.watch_party.room_count(),
    };
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ApiResponse::success(report)))
}
