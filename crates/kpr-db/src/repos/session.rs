//! Session repository
//!
//! Sessions are keyed by the SHA-256 of their current refresh token. Rotation is a
//! compare-and-set on that hash so a replayed token can never match again.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, DbResult, DbSession};

pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_REVOKED: &str = "REVOKED";

const SESSION_COLUMNS: &str = r#"
    id, user_id, refresh_token_hash, ip_address, user_agent, status,
    last_activity_at, created_at
"#;

/// Session repository
pub struct SessionRepo {
    pool: PgPool,
}

impl SessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new active session
    pub async fn create(
        &self,
        id: Uuid,
        user_id: i64,
        refresh_token_hash: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<DbSession> {
        let query = format!(
            r#"
            INSERT INTO user_sessions
                (id, user_id, refresh_token_hash, ip_address, user_agent, status,
                 last_activity_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, DbSession>(&query)
            .bind(id)
            .bind(user_id)
            .bind(refresh_token_hash)
            .bind(ip_address)
            .bind(user_agent)
            .bind(STATUS_ACTIVE)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError::from_insert(e, "session"))
    }

    /// Find an active session by refresh token hash
    pub async fn find_active_by_token_hash(&self, token_hash: &str) -> DbResult<Option<DbSession>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions WHERE refresh_token_hash = $1 AND status = $2"
        );
        let session = sqlx::query_as::<_, DbSession>(&query)
            .bind(token_hash)
            .bind(STATUS_ACTIVE)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Swap the refresh token hash if it still equals `old_hash`.
    ///
    /// Returns `false` when another caller rotated or revoked the session first.
    pub async fn rotate(
        &self,
        session_id: Uuid,
        old_hash: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET refresh_token_hash = $3, last_activity_at = $4
            WHERE id = $1 AND refresh_token_hash = $2 AND status = $5
            "#,
        )
        .bind(session_id)
        .bind(old_hash)
        .bind(new_hash)
        .bind(now)
        .bind(STATUS_ACTIVE)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Revoke a session; returns whether an active session was changed
    pub async fn revoke(&self, session_id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("UPDATE user_sessions SET status = $2 WHERE id = $1 AND status = $3")
            .bind(session_id)
            .bind(STATUS_REVOKED)
            .bind(STATUS_ACTIVE)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Revoke every active session of a user (logout everywhere)
    pub async fn revoke_all_for_user(&self, user_id: i64) -> DbResult<u64> {
        let result =
            sqlx::query("UPDATE user_sessions SET status = $2 WHERE user_id = $1 AND status = $3")
                .bind(user_id)
                .bind(STATUS_REVOKED)
                .bind(STATUS_ACTIVE)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    /// List a user's active sessions, most recently used first
    pub async fn list_active(&self, user_id: i64) -> DbResult<Vec<DbSession>> {
        let query = format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM user_sessions
            WHERE user_id = $1 AND status = $2
            ORDER BY last_activity_at DESC
            "#
        );
        let sessions = sqlx::query_as::<_, DbSession>(&query)
            .bind(user_id)
            .bind(STATUS_ACTIVE)
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }

    /// Delete sessions whose last activity is older than `cutoff`
    pub async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE last_activity_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
