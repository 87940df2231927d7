use axum::{Extension, Json, extract::State};
use marquee_core::providers::{ChatReply, ChatRequest, ProviderError};
use marquee_model::User;
use tracing::debug;

use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError, AppResult},
};

/// Forward a conversation to the chat backend. Nothing is stored.
pub async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ApiResponse<ChatReply>>> {
    let backend = state
        .chat
        .clone()
        .ok_or_else(|| AppError::from(ProviderError::NotConfigured("Chat assistant")))?;
    request.validate()?;

    debug!(user_id = %user.id, turns = request.messages.len(), "chat request");
    let reply = backend.complete(&request).await?;
    Ok(Json(ApiResponse::success(reply)))
}
