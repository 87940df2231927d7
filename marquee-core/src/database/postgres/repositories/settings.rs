use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{AppSettings, SETTINGS_KEY};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::settings::SettingsRepository;
use crate::error::{MarqueeError, Result};

#[derive(sqlx::FromRow)]
struct SettingsRow {
    key: String,
    maintenance_mode: bool,
    maintenance_message: Option<String>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl From<SettingsRow> for AppSettings {
    fn from(row: SettingsRow) -> Self {
        AppSettings {
            key: row.key,
            maintenance_mode: row.maintenance_mode,
            maintenance_message: row.maintenance_message,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresSettingsRepository {
    pool: PgPool,
}

impl PostgresSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self) -> Result<Option<SettingsRow>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT key, maintenance_mode, maintenance_message,
                   updated_at, updated_by
            FROM settings
            WHERE key = $1
            "#,
        )
        .bind(SETTINGS_KEY)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn get_or_create(&self) -> Result<AppSettings> {
        // Read path for every gated request; only the first call writes.
        if let Some(row) = self.fetch().await? {
            return Ok(row.into());
        }

        sqlx::query(
            "INSERT INTO settings (key) VALUES ($1) ON CONFLICT (key) DO NOTHING",
        )
        .bind(SETTINGS_KEY)
        .execute(self.pool())
        .await?;

        self.fetch().await?.map(Into::into).ok_or_else(|| {
            MarqueeError::Persistence("settings row missing after insert".into())
        })
    }

    async fn update_maintenance(
        &self,
        enabled: bool,
        message: Option<String>,
        updated_by: Uuid,
    ) -> Result<AppSettings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            INSERT INTO settings (
                key, maintenance_mode, maintenance_message, updated_at, updated_by
            )
            VALUES ($1, $2, $3, NOW(), $4)
            ON CONFLICT (key) DO UPDATE SET
                maintenance_mode = EXCLUDED.maintenance_mode,
                maintenance_message = EXCLUDED.maintenance_message,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by
            RETURNING key, maintenance_mode, maintenance_message,
                      updated_at, updated_by
            "#,
        )
        .bind(SETTINGS_KEY)
        .bind(enabled)
        .bind(message)
        .bind(updated_by)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }
}
