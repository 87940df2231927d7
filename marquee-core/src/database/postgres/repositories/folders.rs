use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::WatchlistFolder;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::folders::FoldersRepository;
use crate::error::{MarqueeError, Result};

fn name_conflict(name: &str, e: sqlx::Error) -> MarqueeError {
    if let Some(db_err) = e.as_database_error()
        && db_err.constraint() == Some("watchlist_folders_name_key")
    {
        return MarqueeError::Conflict(format!("folder {name:?} already exists"));
    }
    MarqueeError::from(e)
}

#[derive(Clone, Debug)]
pub struct PostgresFoldersRepository {
    pool: PgPool,
}

impl PostgresFoldersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FoldersRepository for PostgresFoldersRepository {
    async fn create(&self, folder: &WatchlistFolder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watchlist_folders (id, user_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(folder.id)
        .bind(folder.user_id)
        .bind(&folder.name)
        .bind(folder.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| name_conflict(&folder.name, e))?;
        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<WatchlistFolder>> {
        let folders = sqlx::query_as::<_, (Uuid, Uuid, String, DateTime<Utc>)>(
            r#"
            SELECT id, user_id, name, created_at
            FROM watchlist_folders
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(|(id, user_id, name, created_at)| WatchlistFolder {
            id,
            user_id,
            name,
            created_at,
        })
        .collect();
        Ok(folders)
    }

    async fn get(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WatchlistFolder>> {
        let row = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            r#"
            SELECT name, created_at
            FROM watchlist_folders
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|(name, created_at)| WatchlistFolder {
            id,
            user_id,
            name,
            created_at,
        }))
    }

    async fn rename(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<WatchlistFolder> {
        let row = sqlx::query_as::<_, (DateTime<Utc>,)>(
            r#"
            UPDATE watchlist_folders SET name = $3
            WHERE id = $1 AND user_id = $2
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| name_conflict(name, e))?;

        let (created_at,) =
            row.ok_or_else(|| MarqueeError::NotFound(format!("folder {id}")))?;
        Ok(WatchlistFolder {
            id,
            user_id,
            name: name.to_string(),
            created_at,
        })
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        // watchlists.folder_id is ON DELETE SET NULL, entries stay.
        let result = sqlx::query(
            "DELETE FROM watchlist_folders WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
