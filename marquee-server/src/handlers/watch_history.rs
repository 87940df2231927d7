//! Watch history and resume points.
//!
//! `POST /api/watch-history` writes straight through. Player heartbeats go
//! to `/playtime`, which queues them on the batch writer; `/flush` is the
//! page-unload beacon and kicks off a background drain.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use marquee_core::playback::PlaytimeUpdate;
use marquee_model::{MediaType, User, WatchHistoryEntry, WatchHistoryKey, WatchProgressFields};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{DeletedCount, parse_media_type, require_positive_id};
use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError, AppResult},
};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;
const MAX_SOURCE_LEN: usize = 32;
const MAX_TITLE_LEN: usize = 500;
/// Upper bound on reports accepted in one unload beacon.
const MAX_BEACON_REPORTS: usize = 50;

/// One progress report from the player.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub media_id: i64,
    pub media_type: MediaType,
    #[serde(default)]
    pub season_number: Option<i32>,
    #[serde(default)]
    pub episode_number: Option<i32>,
    #[serde(flatten)]
    pub fields: WatchProgressFields,
}

impl ProgressReport {
    fn into_update(self, user_id: Uuid) -> Result<PlaytimeUpdate, AppError> {
        validate_fields(&self.fields)?;
        let key = WatchHistoryKey::new(
            user_id,
            self.media_id,
            self.media_type,
            self.season_number,
            self.episode_number,
        )?;
        Ok(PlaytimeUpdate::new(key, self.fields))
    }
}

fn non_negative(name: &str, value: Option<f64>) -> Result<(), AppError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(AppError::bad_request(
            format!("{name} must be a non-negative number"),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn validate_fields(fields: &WatchProgressFields) -> Result<(), AppError> {
    non_negative("currentTime", fields.current_time)?;
    non_negative("totalDuration", fields.total_duration)?;
    non_negative("totalPlayedSeconds", fields.total_played_seconds)?;
    if let Some(progress) = fields.progress
        && (!progress.is_finite() || !(0.0..=100.0).contains(&progress))
    {
        return Err(AppError::bad_request("progress must be between 0 and 100"));
    }
    if fields
        .source
        .as_deref()
        .is_some_and(|s| s.trim().is_empty() || s.len() > MAX_SOURCE_LEN)
    {
        return Err(AppError::bad_request("source is not valid"));
    }
    if fields
        .title
        .as_deref()
        .is_some_and(|t| t.chars().count() > MAX_TITLE_LEN)
    {
        return Err(AppError::bad_request("title is too long"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list_watch_history(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<WatchHistoryEntry>>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let entries = state
        .unit_of_work
        .watch_history
        .list_for_user(user.id, limit)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// Write one report immediately, bypassing the batch queue.
pub async fn save_watch_progress(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(report): Json<ProgressReport>,
) -> AppResult<Json<ApiResponse<WatchHistoryEntry>>> {
    let update = report.into_update(user.id)?;
    let entry = state
        .unit_of_work
        .watch_history
        .upsert(&update.key, &update.fields, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(entry)))
}

pub async fn get_title_history(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((media_type, media_id)): Path<(String, i64)>,
) -> AppResult<Json<ApiResponse<Vec<WatchHistoryEntry>>>> {
    let media_type = parse_media_type(&media_type)?;
    let media_id = require_positive_id(media_id)?;
    let entries = state
        .unit_of_work
        .watch_history
        .list_for_title(user.id, media_id, media_type)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

pub async fn delete_title_history(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((media_type, media_id)): Path<(String, i64)>,
) -> AppResult<Json<ApiResponse<DeletedCount>>> {
    let media_type = parse_media_type(&media_type)?;
    let media_id = require_positive_id(media_id)?;
    let deleted = state
        .unit_of_work
        .watch_history
        .delete_title(user.id, media_id, media_type)
        .await?;
    Ok(Json(ApiResponse::success(DeletedCount { deleted })))
}

pub async fn delete_history_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state
        .unit_of_work
        .watch_history
        .delete(user.id, entry_id)
        .await?
    {
        return Err(AppError::not_found("History entry not found"));
    }
    Ok(Json(
        ApiResponse::success(()).with_message("History entry removed".to_string()),
    ))
}

pub async fn clear_watch_history(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<ApiResponse<DeletedCount>>> {
    let deleted = state.unit_of_work.watch_history.clear(user.id).await?;
    debug!(user_id = %user.id, deleted, "watch history cleared");
    Ok(Json(ApiResponse::success(DeletedCount { deleted })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Queued {
    pub queued: usize,
    pub queue_depth: usize,
}

/// Queue a heartbeat. Persistence happens on the next flush and its
/// failures never reach this request.
pub async fn enqueue_playtime(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(report): Json<ProgressReport>,
) -> AppResult<(StatusCode, Json<ApiResponse<Queued>>)> {
    let update = report.into_update(user.id)?;
    let queue_depth = state.playtime.enqueue(update).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(Queued {
            queued: 1,
            queue_depth,
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BeaconPayload {
    Many(Vec<ProgressReport>),
    One(ProgressReport),
}

fn parse_beacon(body: &[u8]) -> Result<Vec<ProgressReport>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let reports = match serde_json::from_slice::<BeaconPayload>(body) {
        Ok(BeaconPayload::Many(reports)) => reports,
        Ok(BeaconPayload::One(report)) => vec![report],
        Err(_) => return Err(AppError::bad_request("Malformed progress payload")),
    };
    if reports.len() > MAX_BEACON_REPORTS {
        return Err(AppError::bad_request(format!(
            "At most {MAX_BEACON_REPORTS} reports per request"
        )));
    }
    Ok(reports)
}

/// Unload beacon: queue any final reports, then drain in the background.
///
/// `navigator.sendBeacon` posts `text/plain`, so the body is read raw. It
/// cannot set headers either, so the route also takes `?token=`.
pub async fn flush_playtime(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<ApiResponse<Queued>>)> {
    let reports = parse_beacon(&body)?;
    let updates = reports
        .into_iter()
        .map(|report| report.into_update(user.id))
        .collect::<Result<Vec<_>, _>>()?;

    let queued = updates.len();
    let mut queue_depth = state.playtime.queue_depth().await;
    for update in updates {
        queue_depth = state.playtime.enqueue(update).await;
    }

    let user_id = user.id;
    state.playtime.flush_in_background(move |result| match result {
        Ok(report) => debug!(%user_id, persisted = report.persisted, "unload flush finished"),
        Err(err) => warn!(%user_id, error = %err, "unload flush incomplete"),
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(Queued {
            queued,
            queue_depth,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacon_accepts_single_reports_and_arrays() {
        let one = br#"{"mediaId":550,"mediaType":"movie","currentTime":12.5}"#;
        let reports = parse_beacon(one).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].fields.current_time, Some(12.5));

        let many = br#"[
            {"mediaId":1399,"mediaType":"tv","seasonNumber":1,"episodeNumber":2,"progress":40},
            {"mediaId":550,"mediaType":"movie","finished":true}
        ]"#;
        let reports = parse_beacon(many).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].season_number, Some(1));
        assert_eq!(reports[1].fields.finished, Some(true));

        assert!(parse_beacon(b"  ").unwrap().is_empty());
        assert!(parse_beacon(b"not json").is_err());
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let bad_progress = WatchProgressFields {
            progress: Some(140.0),
            ..Default::default()
        };
        assert!(validate_fields(&bad_progress).is_err());

        let negative_time = WatchProgressFields {
            current_time: Some(-1.0),
            ..Default::default()
        };
        assert!(validate_fields(&negative_time).is_err());

        let ok = WatchProgressFields {
            current_time: Some(30.0),
            total_duration: Some(5400.0),
            progress: Some(0.5),
            source: Some("2".into()),
            ..Default::default()
        };
        assert!(validate_fields(&ok).is_ok());
    }

    #[test]
    fn reports_for_tv_need_both_coordinates() {
        let report = ProgressReport {
            media_id: 1399,
            media_type: MediaType::Tv,
            season_number: Some(1),
            episode_number: None,
            fields: WatchProgressFields::default(),
        };
        assert!(report.into_update(Uuid::new_v4()).is_err());
    }
}
