use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::VisitorLog;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::visitor_logs::VisitorLogRepository;
use crate::error::Result;

#[derive(sqlx::FromRow)]
struct VisitorLogRow {
    id: Uuid,
    ip: String,
    user_agent: String,
    browser: String,
    os: String,
    device: String,
    url: Option<String>,
    referer: Option<String>,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<VisitorLogRow> for VisitorLog {
    fn from(row: VisitorLogRow) -> Self {
        VisitorLog {
            id: row.id,
            ip: row.ip,
            user_agent: row.user_agent,
            browser: row.browser,
            os: row.os,
            device: row.device,
            url: row.url,
            referer: row.referer,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresVisitorLogRepository {
    pool: PgPool,
}

impl PostgresVisitorLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VisitorLogRepository for PostgresVisitorLogRepository {
    async fn append(&self, log: &VisitorLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO visitor_logs (
                id, ip, user_agent, browser, os, device, url, referer,
                user_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(log.id)
        .bind(&log.ip)
        .bind(&log.user_agent)
        .bind(&log.browser)
        .bind(&log.os)
        .bind(&log.device)
        .bind(&log.url)
        .bind(&log.referer)
        .bind(log.user_id)
        .bind(log.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<VisitorLog>> {
        let rows = sqlx::query_as::<_, VisitorLogRow>(
            r#"
            SELECT id, ip, user_agent, browser, os, device, url, referer,
                   user_id, created_at
            FROM visitor_logs
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(VisitorLog::from).collect())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visitor_logs")
            .fetch_one(self.pool())
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM visitor_logs")
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM visitor_logs WHERE created_at < $1")
                .bind(cutoff)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected())
    }
}
