//! User repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{DbError, DbResult, DbUser, NewDbUser};

const USER_COLUMNS: &str = r#"
    id, username, email, phone, password_hash, role, status,
    failed_login_attempts, locked_until, email_verified_at, phone_verified_at,
    last_login_at, created_at, updated_at
"#;

/// User repository for credential lookup and login bookkeeping
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, user: NewDbUser<'_>) -> DbResult<DbUser> {
        let query = format!(
            r#"
            INSERT INTO users (username, email, phone, password_hash, role, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, DbUser>(&query)
            .bind(user.username)
            .bind(user.email)
            .bind(user.phone)
            .bind(user.password_hash)
            .bind(user.role)
            .bind(user.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError::from_insert(e, "user"))
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<DbUser>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, DbUser>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by username
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<DbUser>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, DbUser>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<DbUser>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let user = sqlx::query_as::<_, DbUser>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by username or email (login identifier)
    pub async fn find_by_identifier(&self, identifier: &str) -> DbResult<Option<DbUser>> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE username = $1 OR lower(email) = lower($1)
            ORDER BY (username = $1) DESC
            LIMIT 1
            "#
        );
        let user = sqlx::query_as::<_, DbUser>(&query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Increment the failed-login counter in a single statement.
    ///
    /// When the incremented counter reaches `threshold`, `locked_until` is set to
    /// `lock_until`. Returns the updated row, or `None` if the user is gone.
    pub async fn record_failed_login(
        &self,
        user_id: i64,
        threshold: i32,
        lock_until: DateTime<Utc>,
    ) -> DbResult<Option<DbUser>> {
        let query = format!(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1,
                locked_until = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN $3
                    ELSE locked_until
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, DbUser>(&query)
            .bind(user_id)
            .bind(threshold)
            .bind(lock_until)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Reset failed-login counter and clear any lock
    pub async fn reset_failed_logins(&self, user_id: i64) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, locked_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update last login timestamp
    pub async fn touch_last_login(&self, user_id: i64, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
