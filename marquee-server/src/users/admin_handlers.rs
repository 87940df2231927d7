use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use marquee_model::{AppSettings, User, UserRole, VisitorLog};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::handlers::DeletedCount;
use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError, AppResult},
};

const DEFAULT_VISITOR_PAGE: usize = 50;
const MAX_VISITOR_PAGE: usize = 500;
const MAX_MAINTENANCE_MESSAGE_LEN: usize = 500;

pub async fn list_users(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    let users = state.unit_of_work.users.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let role: UserRole = request
        .role
        .parse()
        .map_err(|_| AppError::bad_request("Role must be 'user' or 'admin'"))?;
    if user_id == admin.id {
        return Err(AppError::bad_request("You cannot change your own role"));
    }

    let users = &state.unit_of_work.users;
    if users.get_user_by_id(user_id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }
    users.set_role(user_id, role).await?;
    info!(admin_id = %admin.id, %user_id, role = role.as_str(), "user role changed");

    let updated = users
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    if user_id == admin.id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }
    if !state.unit_of_work.users.delete_user(user_id).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!(admin_id = %admin.id, %user_id, "user deleted");
    Ok(Json(
        ApiResponse::success(()).with_message("User deleted".to_string()),
    ))
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub enabled: bool,
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn update_maintenance(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Json(request): Json<MaintenanceRequest>,
) -> AppResult<Json<ApiResponse<AppSettings>>> {
    let message = request
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    if message
        .as_deref()
        .is_some_and(|m| m.chars().count() > MAX_MAINTENANCE_MESSAGE_LEN)
    {
        return Err(AppError::bad_request(format!(
            "Maintenance message is limited to {MAX_MAINTENANCE_MESSAGE_LEN} characters"
        )));
    }

    let settings = state
        .unit_of_work
        .settings
        .update_maintenance(request.enabled, message, admin.id)
        .await?;
    info!(admin_id = %admin.id, enabled = settings.maintenance_mode, "maintenance mode updated");
    Ok(Json(ApiResponse::success(settings)))
}

#[derive(Debug, Deserialize)]
pub struct VisitorPageQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct VisitorPage {
    pub total: u64,
    pub items: Vec<VisitorLog>,
}

pub async fn list_visitor_logs(
    State(state): State<AppState>,
    Query(query): Query<VisitorPageQuery>,
) -> AppResult<Json<ApiResponse<VisitorPage>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_VISITOR_PAGE)
        .clamp(1, MAX_VISITOR_PAGE);
    let offset = query.offset.unwrap_or(0);

    let logs = &state.unit_of_work.visitor_logs;
    let total = logs.count().await?;
    let items = logs.list(limit, offset).await?;
    Ok(Json(ApiResponse::success(VisitorPage { total, items })))
}

pub async fn clear_visitor_logs(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
) -> AppResult<Json<ApiResponse<DeletedCount>>> {
    let deleted = state.unit_of_work.visitor_logs.delete_all().await?;
    info!(admin_id = %admin.id, deleted, "visitor logs cleared");
    Ok(Json(ApiResponse::success(DeletedCount { deleted })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaytimeQueueStatus {
    pub queue_depth: usize,
    pub max_batch: usize,
    pub flush_interval_secs: u64,
}

pub async fn playtime_queue_status(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<PlaytimeQueueStatus>>> {
    let config = state.playtime.config();
    Ok(Json(ApiResponse::success(PlaytimeQueueStatus {
        queue_depth: state.playtime.queue_depth().await,
        max_batch: config.max_batch,
        flush_interval_secs: config.flush_interval.as_secs(),
    })))
}
