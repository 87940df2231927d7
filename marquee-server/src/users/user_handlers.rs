use axum::{Extension, Json, extract::State};
use marquee_model::User;
use serde::Deserialize;
use url::Url;

use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError, AppResult},
};

const MAX_IMAGE_URL_LEN: usize = 2048;

pub async fn get_current_user(
    Extension(user): Extension<User>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(ApiResponse::success(user)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    /// `null` clears the image.
    pub image: Option<String>,
}

fn validate_image_url(raw: Option<String>) -> Result<Option<String>, AppError> {
    let Some(raw) = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    else {
        return Ok(None);
    };
    if raw.len() > MAX_IMAGE_URL_LEN {
        return Err(AppError::bad_request("Image URL is too long"));
    }
    let url = Url::parse(&raw)
        .map_err(|_| AppError::bad_request("Image must be an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::bad_request("Image URL must use http or https"));
    }
    Ok(Some(url.to_string()))
}

pub async fn update_profile_image(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateImageRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let image = validate_image_url(request.image)?;
    let users = &state.unit_of_work.users;
    users.set_image(user.id, image).await?;

    let updated = users
        .get_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(ApiResponse::success(updated)))
}
