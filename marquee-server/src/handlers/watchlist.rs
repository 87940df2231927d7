use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use marquee_model::{NewWatchlistEntry, User, WatchlistEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_media_type, require_positive_id};
use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError, AppResult},
};

const MAX_TITLE_LEN: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistQuery {
    #[serde(default)]
    pub folder_id: Option<Uuid>,
}

pub async fn list_watchlist(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<WatchlistQuery>,
) -> AppResult<Json<ApiResponse<Vec<WatchlistEntry>>>> {
    let entries = state
        .unit_of_work
        .watchlist
        .list(user.id, query.folder_id)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

fn validate_new_entry(entry: &mut NewWatchlistEntry) -> Result<(), AppError> {
    require_positive_id(entry.media_id)?;
    entry.title = entry.title.trim().to_string();
    if entry.title.is_empty() || entry.title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::bad_request(format!(
            "Title must be 1-{MAX_TITLE_LEN} characters"
        )));
    }
    if entry
        .vote_average
        .is_some_and(|v| !v.is_finite() || !(0.0..=10.0).contains(&v))
    {
        return Err(AppError::bad_request("voteAverage must be between 0 and 10"));
    }
    Ok(())
}

/// Reject folder ids that do not belong to the caller.
async fn ensure_folder_owned(
    state: &AppState,
    user_id: Uuid,
    folder_id: Option<Uuid>,
) -> AppResult<()> {
    if let Some(folder_id) = folder_id
        && state
            .unit_of_work
            .folders
            .get(user_id, folder_id)
            .await?
            .is_none()
    {
        return Err(AppError::not_found("Folder not found"));
    }
    Ok(())
}

pub async fn add_to_watchlist(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(mut request): Json<NewWatchlistEntry>,
) -> AppResult<(StatusCode, Json<ApiResponse<WatchlistEntry>>)> {
    validate_new_entry(&mut request)?;
    ensure_folder_owned(&state, user.id, request.folder_id).await?;

    let entry = WatchlistEntry::from_new(user.id, request);
    state.unit_of_work.watchlist.add(&entry).await.map_err(|err| {
        match AppError::from(err) {
            conflict if conflict.status == StatusCode::CONFLICT => {
                AppError::conflict("Title is already on your watchlist")
            }
            other => other,
        }
    })?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

#[derive(Debug, Serialize)]
pub struct WatchlistStatus {
    pub saved: bool,
    pub entry: Option<WatchlistEntry>,
}

pub async fn get_watchlist_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((media_type, media_id)): Path<(String, i64)>,
) -> AppResult<Json<ApiResponse<WatchlistStatus>>> {
    let media_type = parse_media_type(&media_type)?;
    let media_id = require_positive_id(media_id)?;
    let entry = state
        .unit_of_work
        .watchlist
        .get(user.id, media_id, media_type)
        .await?;
    Ok(Json(ApiResponse::success(WatchlistStatus {
        saved: entry.is_some(),
        entry,
    })))
}

pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((media_type, media_id)): Path<(String, i64)>,
) -> AppResult<Json<ApiResponse<()>>> {
    let media_type = parse_media_type(&media_type)?;
    let media_id = require_positive_id(media_id)?;
    if !state
        .unit_of_work
        .watchlist
        .remove(user.id, media_id, media_type)
        .await?
    {
        return Err(AppError::not_found("Title is not on your watchlist"));
    }
    Ok(Json(
        ApiResponse::success(()).with_message("Removed from watchlist".to_string()),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToFolderRequest {
    /// `null` moves the entry out of any folder.
    pub folder_id: Option<Uuid>,
}

pub async fn move_watchlist_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<MoveToFolderRequest>,
) -> AppResult<Json<ApiResponse<WatchlistEntry>>> {
    ensure_folder_owned(&state, user.id, request.folder_id).await?;
    let entry = state
        .unit_of_work
        .watchlist
        .move_to_folder(user.id, entry_id, request.folder_id)
        .await?;
    Ok(Json(ApiResponse::success(entry)))
}
