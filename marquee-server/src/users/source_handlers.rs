//! Last used video source preference.

use axum::{Extension, Json, extract::State};
use chrono::{DateTime, Utc};
use marquee_core::playback::{ResolvedSource, SourceUpdateOutcome};
use marquee_model::User;
use serde::Deserialize;

use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppResult},
};

pub async fn get_last_used_source(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<ApiResponse<Option<ResolvedSource>>>> {
    let resolved = state.sources.resolve(user.id).await?;
    Ok(Json(ApiResponse::success(resolved)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUpdateRequest {
    /// Canonical name or legacy numeric id.
    pub source: String,
    /// When the client used the source. Heartbeats only.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    /// A direct user choice rather than a player heartbeat.
    #[serde(default)]
    pub explicit: bool,
}

pub async fn update_last_used_source(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<SourceUpdateRequest>,
) -> AppResult<Json<ApiResponse<SourceUpdateOutcome>>> {
    let outcome = state
        .sources
        .update(user.id, &request.source, request.at, request.explicit)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
