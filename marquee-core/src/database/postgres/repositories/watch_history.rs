use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{
    MediaType, WatchHistoryEntry, WatchHistoryKey, WatchProgressFields,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::watch_history::WatchHistoryRepository;
use crate::error::{MarqueeError, Result};

const HISTORY_COLUMNS: &str = r#"
    id, user_id, media_id, media_type, season_number, episode_number,
    current_time_seconds, total_duration, progress, total_played_seconds,
    finished, title, poster_path, source, source_set_at, last_watched_at,
    created_at
"#;

#[derive(sqlx::FromRow)]
struct WatchHistoryRow {
    id: Uuid,
    user_id: Uuid,
    media_id: i64,
    media_type: String,
    season_number: Option<i32>,
    episode_number: Option<i32>,
    current_time_seconds: f64,
    total_duration: f64,
    progress: f64,
    total_played_seconds: f64,
    finished: bool,
    title: Option<String>,
    poster_path: Option<String>,
    source: Option<String>,
    source_set_at: Option<DateTime<Utc>>,
    last_watched_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WatchHistoryRow> for WatchHistoryEntry {
    type Error = MarqueeError;

    fn try_from(row: WatchHistoryRow) -> Result<Self> {
        Ok(WatchHistoryEntry {
            id: row.id,
            user_id: row.user_id,
            media_id: row.media_id,
            media_type: row.media_type.parse()?,
            season_number: row.season_number,
            episode_number: row.episode_number,
            current_time: row.current_time_seconds,
            total_duration: row.total_duration,
            progress: row.progress,
            total_played_seconds: row.total_played_seconds,
            finished: row.finished,
            title: row.title,
            poster_path: row.poster_path,
            source: row.source,
            source_set_at: row.source_set_at,
            last_watched_at: row.last_watched_at,
            created_at: row.created_at,
        })
    }
}

fn into_entries(rows: Vec<WatchHistoryRow>) -> Result<Vec<WatchHistoryEntry>> {
    rows.into_iter().map(WatchHistoryEntry::try_from).collect()
}

/// Clamp a caller-supplied limit to what Postgres accepts for `LIMIT`.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[derive(Clone, Debug)]
pub struct PostgresWatchHistoryRepository {
    pool: PgPool,
}

impl PostgresWatchHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl WatchHistoryRepository for PostgresWatchHistoryRepository {
    async fn upsert(
        &self,
        key: &WatchHistoryKey,
        fields: &WatchProgressFields,
        watched_at: DateTime<Utc>,
    ) -> Result<WatchHistoryEntry> {
        // The unique constraint treats NULL season/episode as equal, so
        // movie rows collide on (user, media, type).
        let sql = format!(
            r#"
            INSERT INTO watch_history (
                id, user_id, media_id, media_type, season_number, episode_number,
                current_time_seconds, total_duration, progress,
                total_played_seconds, finished, title, poster_path,
                source, source_set_at, last_watched_at, created_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6,
                COALESCE($7, 0), COALESCE($8, 0), COALESCE($9, 0),
                COALESCE($10, 0), COALESCE($11, FALSE), $12, $13,
                $14, CASE WHEN $14::TEXT IS NULL THEN NULL ELSE $15 END,
                $15, $15
            )
            ON CONFLICT ON CONSTRAINT watch_history_key DO UPDATE SET
                current_time_seconds = COALESCE($7, watch_history.current_time_seconds),
                total_duration = COALESCE($8, watch_history.total_duration),
                progress = COALESCE($9, watch_history.progress),
                total_played_seconds = COALESCE($10, watch_history.total_played_seconds),
                finished = COALESCE($11, watch_history.finished),
                title = COALESCE($12, watch_history.title),
                poster_path = COALESCE($13, watch_history.poster_path),
                source = COALESCE($14, watch_history.source),
                source_set_at = CASE
                    WHEN $14::TEXT IS NULL THEN watch_history.source_set_at
                    ELSE $15
                END,
                last_watched_at = GREATEST(watch_history.last_watched_at, $15)
            RETURNING {HISTORY_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, WatchHistoryRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(key.user_id)
            .bind(key.media_id)
            .bind(key.media_type.as_str())
            .bind(key.season_number)
            .bind(key.episode_number)
            .bind(fields.current_time)
            .bind(fields.total_duration)
            .bind(fields.progress)
            .bind(fields.total_played_seconds)
            .bind(fields.finished)
            .bind(&fields.title)
            .bind(&fields.poster_path)
            .bind(&fields.source)
            .bind(watched_at)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                MarqueeError::Persistence(format!(
                    "Failed to upsert watch history: {e}"
                ))
            })?;

        row.try_into()
    }

    async fn get(
        &self,
        key: &WatchHistoryKey,
    ) -> Result<Option<WatchHistoryEntry>> {
        let sql = format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM watch_history
            WHERE user_id = $1
              AND media_id = $2
              AND media_type = $3
              AND season_number IS NOT DISTINCT FROM $4
              AND episode_number IS NOT DISTINCT FROM $5
            "#
        );
        sqlx::query_as::<_, WatchHistoryRow>(&sql)
            .bind(key.user_id)
            .bind(key.media_id)
            .bind(key.media_type.as_str())
            .bind(key.season_number)
            .bind(key.episode_number)
            .fetch_optional(self.pool())
            .await?
            .map(WatchHistoryEntry::try_from)
            .transpose()
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WatchHistoryEntry>> {
        let sql = format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM watch_history
            WHERE user_id = $1
            ORDER BY last_watched_at DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, WatchHistoryRow>(&sql)
            .bind(user_id)
            .bind(sql_limit(limit))
            .fetch_all(self.pool())
            .await?;
        into_entries(rows)
    }

    async fn list_for_title(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<Vec<WatchHistoryEntry>> {
        let sql = format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM watch_history
            WHERE user_id = $1 AND media_id = $2 AND media_type = $3
            ORDER BY last_watched_at DESC
            "#
        );
        let rows = sqlx::query_as::<_, WatchHistoryRow>(&sql)
            .bind(user_id)
            .bind(media_id)
            .bind(media_type.as_str())
            .fetch_all(self.pool())
            .await?;
        into_entries(rows)
    }

    async fn recent_with_source(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WatchHistoryEntry>> {
        let sql = format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM watch_history
            WHERE user_id = $1 AND source IS NOT NULL
            ORDER BY last_watched_at DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, WatchHistoryRow>(&sql)
            .bind(user_id)
            .bind(sql_limit(limit))
            .fetch_all(self.pool())
            .await?;
        into_entries(rows)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM watch_history WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_title(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM watch_history
            WHERE user_id = $1 AND media_id = $2 AND media_type = $3
            "#,
        )
        .bind(user_id)
        .bind(media_id)
        .bind(media_type.as_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM watch_history WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
