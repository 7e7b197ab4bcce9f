//! Verification token repository (email verification, password reset)

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{STATUS_ACTIVE, STATUS_REVOKED};
use crate::{DbError, DbResult, DbVerificationToken, TokenConsumption, TokenSideEffect};

const TOKEN_COLUMNS: &str = "id, user_id, token_hash, purpose, expires_at, used_at, created_at";

/// Verification token repository
pub struct VerificationTokenRepo {
    pool: PgPool,
}

impl VerificationTokenRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new token (hash only)
    pub async fn create(
        &self,
        id: Uuid,
        user_id: i64,
        token_hash: &str,
        purpose: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<DbVerificationToken> {
        let query = format!(
            r#"
            INSERT INTO verification_tokens (id, user_id, token_hash, purpose, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TOKEN_COLUMNS}
            "#
        );

        sqlx::query_as::<_, DbVerificationToken>(&query)
            .bind(id)
            .bind(user_id)
            .bind(token_hash)
            .bind(purpose)
            .bind(expires_at)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError::from_insert(e, "verification token"))
    }

    /// Find a token by hash and purpose
    pub async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: &str,
    ) -> DbResult<Option<DbVerificationToken>> {
        let query = format!(
            "SELECT {TOKEN_COLUMNS} FROM verification_tokens WHERE token_hash = $1 AND purpose = $2"
        );
        let token = sqlx::query_as::<_, DbVerificationToken>(&query)
            .bind(token_hash)
            .bind(purpose)
            .fetch_optional(&self.pool)
            .await?;

        Ok(token)
    }

    /// Mark a token used and apply its side effect in one transaction.
    ///
    /// The token must be unused and unexpired at `now`; otherwise nothing is
    /// committed and the returned outcome says why.
    pub async fn consume(
        &self,
        token_id: Uuid,
        effect: TokenSideEffect<'_>,
        now: DateTime<Utc>,
    ) -> DbResult<TokenConsumption> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        let user_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE verification_tokens SET used_at = $2
            WHERE id = $1 AND used_at IS NULL AND expires_at > $2
            RETURNING user_id
            "#,
        )
        .bind(token_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            let used_at: Option<Option<DateTime<Utc>>> =
                sqlx::query_scalar("SELECT used_at FROM verification_tokens WHERE id = $1")
                    .bind(token_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return Ok(match used_at {
                None => TokenConsumption::Missing,
                Some(Some(_)) => TokenConsumption::AlreadyUsed,
                Some(None) => TokenConsumption::Expired,
            });
        };

        let mut sessions_revoked = 0;
        match effect {
            TokenSideEffect::None => {}
            TokenSideEffect::VerifyEmail => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET email_verified_at = COALESCE(email_verified_at, $2),
                        status = CASE WHEN status = 'PENDING_VERIFICATION' THEN 'ACTIVE' ELSE status END,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            TokenSideEffect::SetPassword(password_hash) => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET password_hash = $2, failed_login_attempts = 0, locked_until = NULL,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(user_id)
                .bind(password_hash)
                .execute(&mut *tx)
                .await?;

                sessions_revoked = sqlx::query(
                    "UPDATE user_sessions SET status = $2 WHERE user_id = $1 AND status = $3",
                )
                .bind(user_id)
                .bind(STATUS_REVOKED)
                .bind(STATUS_ACTIVE)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        Ok(TokenConsumption::Consumed { sessions_revoked })
    }

    /// Delete tokens that expired before `cutoff`
    pub async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
