pub mod chat;
pub mod folders;
pub mod health;
pub mod metadata;
pub mod settings;
pub mod sources;
pub mod visitors;
pub mod watch_history;
pub mod watchlist;

use marquee_model::MediaType;
use serde::Serialize;

use crate::infra::errors::AppError;

/// Path segment to [`MediaType`]; accepts the provider spellings.
pub(crate) fn parse_media_type(raw: &str) -> Result<MediaType, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Unknown media type: {raw}")))
}

pub(crate) fn require_positive_id(media_id: i64) -> Result<i64, AppError> {
    if media_id <= 0 {
        return Err(AppError::bad_request("Media id must be positive"));
    }
    Ok(media_id)
}

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u64,
}
