use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{MediaType, WatchlistEntry};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::watchlist::WatchlistRepository;
use crate::error::{MarqueeError, Result};

const WATCHLIST_COLUMNS: &str = r#"
    id, user_id, media_id, media_type, title, poster_path, vote_average,
    folder_id, added_at
"#;

#[derive(sqlx::FromRow)]
struct WatchlistRow {
    id: Uuid,
    user_id: Uuid,
    media_id: i64,
    media_type: String,
    title: String,
    poster_path: Option<String>,
    vote_average: Option<f64>,
    folder_id: Option<Uuid>,
    added_at: DateTime<Utc>,
}

impl TryFrom<WatchlistRow> for WatchlistEntry {
    type Error = MarqueeError;

    fn try_from(row: WatchlistRow) -> Result<Self> {
        Ok(WatchlistEntry {
            id: row.id,
            user_id: row.user_id,
            media_id: row.media_id,
            media_type: row.media_type.parse()?,
            title: row.title,
            poster_path: row.poster_path,
            vote_average: row.vote_average,
            folder_id: row.folder_id,
            added_at: row.added_at,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PostgresWatchlistRepository {
    pool: PgPool,
}

impl PostgresWatchlistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_folder(
        &self,
        user_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<()> {
        let Some(folder_id) = folder_id else {
            return Ok(());
        };
        let owned: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM watchlist_folders WHERE id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(folder_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        if !owned {
            return Err(MarqueeError::NotFound(format!("folder {folder_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl WatchlistRepository for PostgresWatchlistRepository {
    async fn add(&self, entry: &WatchlistEntry) -> Result<()> {
        self.ensure_folder(entry.user_id, entry.folder_id).await?;

        sqlx::query(
            r#"
            INSERT INTO watchlists (
                id, user_id, media_id, media_type, title, poster_path,
                vote_average, folder_id, added_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.media_id)
        .bind(entry.media_type.as_str())
        .bind(&entry.title)
        .bind(&entry.poster_path)
        .bind(entry.vote_average)
        .bind(entry.folder_id)
        .bind(entry.added_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error()
                && db_err.constraint() == Some("watchlists_key")
            {
                return MarqueeError::Conflict(format!(
                    "{} {} is already on the watchlist",
                    entry.media_type, entry.media_id
                ));
            }
            MarqueeError::from(e)
        })?;
        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<WatchlistEntry>> {
        let sql = format!(
            r#"
            SELECT {WATCHLIST_COLUMNS}
            FROM watchlists
            WHERE user_id = $1 AND ($2::UUID IS NULL OR folder_id = $2)
            ORDER BY added_at DESC
            "#
        );
        sqlx::query_as::<_, WatchlistRow>(&sql)
            .bind(user_id)
            .bind(folder_id)
            .fetch_all(self.pool())
            .await?
            .into_iter()
            .map(WatchlistEntry::try_from)
            .collect()
    }

    async fn get(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<Option<WatchlistEntry>> {
        let sql = format!(
            r#"
            SELECT {WATCHLIST_COLUMNS}
            FROM watchlists
            WHERE user_id = $1 AND media_id = $2 AND media_type = $3
            "#
        );
        sqlx::query_as::<_, WatchlistRow>(&sql)
            .bind(user_id)
            .bind(media_id)
            .bind(media_type.as_str())
            .fetch_optional(self.pool())
            .await?
            .map(WatchlistEntry::try_from)
            .transpose()
    }

    async fn remove(
        &self,
        user_id: Uuid,
        media_id: i64,
        media_type: MediaType,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM watchlists
            WHERE user_id = $1 AND media_id = $2 AND media_type = $3
            "#,
        )
        .bind(user_id)
        .bind(media_id)
        .bind(media_type.as_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn move_to_folder(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<WatchlistEntry> {
        self.ensure_folder(user_id, folder_id).await?;

        let sql = format!(
            r#"
            UPDATE watchlists SET folder_id = $3
            WHERE id = $1 AND user_id = $2
            RETURNING {WATCHLIST_COLUMNS}
            "#
        );
        sqlx::query_as::<_, WatchlistRow>(&sql)
            .bind(entry_id)
            .bind(user_id)
            .bind(folder_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| {
                MarqueeError::NotFound(format!("watchlist entry {entry_id}"))
            })?
            .try_into()
    }
}
