use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use marquee_model::{User, WatchlistFolder};
use serde::Deserialize;
use uuid::Uuid;

use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError, AppResult},
};

const MAX_FOLDER_NAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct FolderNameRequest {
    pub name: String,
}

fn validate_folder_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(AppError::bad_request(format!(
            "Folder name must be 1-{MAX_FOLDER_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub async fn list_folders(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<ApiResponse<Vec<WatchlistFolder>>>> {
    let folders = state.unit_of_work.folders.list(user.id).await?;
    Ok(Json(ApiResponse::success(folders)))
}

pub async fn create_folder(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<FolderNameRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<WatchlistFolder>>)> {
    let name = validate_folder_name(&request.name)?;
    let folder = WatchlistFolder::new(user.id, name);
    state.unit_of_work.folders.create(&folder).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(folder))))
}

pub async fn rename_folder(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(folder_id): Path<Uuid>,
    Json(request): Json<FolderNameRequest>,
) -> AppResult<Json<ApiResponse<WatchlistFolder>>> {
    let name = validate_folder_name(&request.name)?;
    let folder = state
        .unit_of_work
        .folders
        .rename(user.id, folder_id, &name)
        .await?;
    Ok(Json(ApiResponse::success(folder)))
}

/// Entries in the folder stay on the watchlist, unfiled.
pub async fn delete_folder(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(folder_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state.unit_of_work.folders.delete(user.id, folder_id).await? {
        return Err(AppError::not_found("Folder not found"));
    }
    Ok(Json(
        ApiResponse::success(()).with_message("Folder deleted".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names_are_bounded() {
        assert_eq!(validate_folder_name("  Noir ").unwrap(), "Noir");
        assert!(validate_folder_name("").is_err());
        assert!(validate_folder_name(&"n".repeat(MAX_FOLDER_NAME_LEN + 1)).is_err());
    }
}
