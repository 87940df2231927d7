use axum::{
    Json,
    extract::{Path, Query},
};
use marquee_core::sources::{
    EmbedParams, EmbedProvider as _, ProviderCapabilities, VideoSource, normalize,
};
use serde::Serialize;

use super::{parse_media_type, require_positive_id};
use crate::infra::errors::{ApiResponse, AppError, AppResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    pub name: &'static str,
    /// Legacy numeric id.
    pub id: &'static str,
    pub legacy: bool,
    pub active: bool,
    pub capabilities: ProviderCapabilities,
}

impl From<VideoSource> for SourceDescriptor {
    fn from(source: VideoSource) -> Self {
        Self {
            name: source.name(),
            id: source.legacy_id(),
            legacy: source.is_legacy(),
            active: !source.is_legacy(),
            capabilities: *source.capabilities(),
        }
    }
}

pub async fn list_sources() -> Json<ApiResponse<Vec<SourceDescriptor>>> {
    let sources = VideoSource::ALL
        .into_iter()
        .map(SourceDescriptor::from)
        .collect();
    Json(ApiResponse::success(sources))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedResponse {
    pub source: VideoSource,
    pub url: String,
    pub capabilities: ProviderCapabilities,
}

/// Build the iframe URL for `source`. Options the provider does not support
/// are dropped.
pub async fn embed_url(
    Path((source, media_type, media_id)): Path<(String, String, i64)>,
    Query(mut params): Query<EmbedParams>,
) -> AppResult<Json<ApiResponse<EmbedResponse>>> {
    let source = normalize(&source).map_err(|e| AppError::bad_request(e.to_string()))?;
    params.media_type = Some(parse_media_type(&media_type)?);
    params.media_id = require_positive_id(media_id)?;

    let url = source
        .provider()
        .build_embed_url(&params)
        .map_err(|e| AppError::bad_request(e.to_string()))?;
    Ok(Json(ApiResponse::success(EmbedResponse {
        source,
        url: url.to_string(),
        capabilities: *source.capabilities(),
    })))
}
