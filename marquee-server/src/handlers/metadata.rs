//! TMDB pass-through. Responses are relayed as the provider shapes them.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use marquee_core::providers::{MetadataProvider, ProviderError, TrendingWindow};
use marquee_model::MediaType;
use serde::Deserialize;
use serde_json::Value;

use super::{parse_media_type, require_positive_id};
use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError, AppResult},
};

const MAX_QUERY_LEN: usize = 200;
const MAX_PAGE: u32 = 500;

fn provider(state: &AppState) -> AppResult<Arc<dyn MetadataProvider>> {
    state
        .metadata
        .clone()
        .ok_or_else(|| ProviderError::NotConfigured("Metadata provider").into())
}

fn check_page(page: Option<u32>) -> AppResult<Option<u32>> {
    match page {
        Some(p) if p == 0 || p > MAX_PAGE => Err(AppError::bad_request(format!(
            "page must be between 1 and {MAX_PAGE}"
        ))),
        other => Ok(other),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let provider = provider(&state)?;
    let q = query.q.trim();
    if q.is_empty() || q.chars().count() > MAX_QUERY_LEN {
        return Err(AppError::bad_request(format!(
            "q must be 1-{MAX_QUERY_LEN} characters"
        )));
    }
    let media_type = query
        .media_type
        .as_deref()
        .map(parse_media_type)
        .transpose()?;
    let page = check_page(query.page)?;

    let results = provider.search(q, media_type, page).await?;
    Ok(Json(ApiResponse::success(results)))
}

pub async fn details(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(String, i64)>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let provider = provider(&state)?;
    let media_type = parse_media_type(&media_type)?;
    let id = require_positive_id(id)?;
    let details = provider.details(media_type, id).await?;
    Ok(Json(ApiResponse::success(details)))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
}

pub async fn recommendations(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(String, i64)>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let provider = provider(&state)?;
    let media_type = parse_media_type(&media_type)?;
    let id = require_positive_id(id)?;
    let page = check_page(query.page)?;
    let results = provider.recommendations(media_type, id, page).await?;
    Ok(Json(ApiResponse::success(results)))
}

pub async fn season(
    State(state): State<AppState>,
    Path((media_type, id, season)): Path<(String, i64, i32)>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let provider = provider(&state)?;
    if parse_media_type(&media_type)? != MediaType::Tv {
        return Err(AppError::bad_request("Seasons exist only for TV shows"));
    }
    let id = require_positive_id(id)?;
    if season < 0 {
        return Err(AppError::bad_request("Season number must not be negative"));
    }
    let season = provider.season(id, season).await?;
    Ok(Json(ApiResponse::success(season)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingQuery {
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub window: TrendingWindow,
}

pub async fn trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let provider = provider(&state)?;
    let media_type = query
        .media_type
        .as_deref()
        .map(parse_media_type)
        .transpose()?;
    let results = provider.trending(media_type, query.window).await?;
    Ok(Json(ApiResponse::success(results)))
}
