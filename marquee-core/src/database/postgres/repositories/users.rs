use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{User, UserRole};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::ports::users::{
    SourceWrite, SourceWriteOutcome, UsersRepository,
};
use crate::error::{MarqueeError, Result};

const USER_COLUMNS: &str = r#"
    id, email, username, password_hash, image, role, provider,
    last_used_source, last_used_source_at, last_used_source_explicit,
    created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: Option<String>,
    password_hash: Option<String>,
    image: Option<String>,
    role: String,
    provider: String,
    last_used_source: Option<String>,
    last_used_source_at: Option<DateTime<Utc>>,
    last_used_source_explicit: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = MarqueeError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            image: row.image,
            role: row.role.parse()?,
            provider: row.provider.parse()?,
            last_used_source: row.last_used_source,
            last_used_source_at: row.last_used_source_at,
            last_used_source_explicit: row.last_used_source_explicit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed implementation of the `UsersRepository` port.
#[derive(Clone, Debug)]
pub struct PostgresUsersRepository {
    pool: PgPool,
}

impl PostgresUsersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UsersRepository for PostgresUsersRepository {
    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, username, password_hash, image, role, provider,
                last_used_source, last_used_source_at,
                last_used_source_explicit, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.image)
        .bind(user.role.as_str())
        .bind(user.provider.as_str())
        .bind(&user.last_used_source)
        .bind(user.last_used_source_at)
        .bind(user.last_used_source_explicit)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error()
                && db_err.is_unique_violation()
            {
                return MarqueeError::Conflict(
                    "Email already exists".to_string(),
                );
            }
            MarqueeError::Persistence(format!("Failed to create user: {e}"))
        })?;

        info!(user_id = %user.id, "Created user");
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(self.pool())
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                username = $3,
                password_hash = $4,
                image = $5,
                role = $6,
                provider = $7,
                last_used_source = $8,
                last_used_source_at = $9,
                last_used_source_explicit = $10,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.image)
        .bind(user.role.as_str())
        .bind(user.provider.as_str())
        .bind(&user.last_used_source)
        .bind(user.last_used_source_at)
        .bind(user.last_used_source_explicit)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(MarqueeError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(role.as_str())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(MarqueeError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn set_image(&self, id: Uuid, image: Option<String>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET image = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(image)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(MarqueeError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn write_last_used_source(
        &self,
        id: Uuid,
        write: &SourceWrite,
    ) -> Result<SourceWriteOutcome> {
        // Mirrors SourceWrite::may_overwrite in one statement.
        let result = sqlx::query(
            r#"
            UPDATE users SET
                last_used_source = $2,
                last_used_source_at = $3,
                last_used_source_explicit = $4,
                updated_at = NOW()
            WHERE id = $1
              AND (
                $4
                OR (
                    NOT last_used_source_explicit
                    AND (last_used_source_at IS NULL OR last_used_source_at < $3)
                )
              )
            "#,
        )
        .bind(id)
        .bind(&write.source)
        .bind(write.at)
        .bind(write.explicit)
        .execute(self.pool())
        .await?;

        if result.rows_affected() > 0 {
            return Ok(SourceWriteOutcome::Applied);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool())
                .await?;

        Ok(if exists {
            SourceWriteOutcome::Rejected
        } else {
            SourceWriteOutcome::UserMissing
        })
    }
}
