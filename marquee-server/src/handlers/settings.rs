use axum::{Json, extract::State};
use serde::Serialize;

use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppResult},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceStatus {
    pub maintenance_mode: bool,
    pub maintenance_message: Option<String>,
}

/// Public so the front end can show the banner before sign-in.
pub async fn get_maintenance(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<MaintenanceStatus>>> {
    let settings = state.unit_of_work.settings.get_or_create().await?;
    Ok(Json(ApiResponse::success(MaintenanceStatus {
        maintenance_mode: settings.maintenance_mode,
        maintenance_message: settings.maintenance_message,
    })))
}
