//! PostgreSQL-backed repositories
//!
//! Thin mapping from `kpr-db` rows to domain types. All atomicity lives in the
//! SQL of the underlying repos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use kpr_db::{
    Database, DbError, DbSession, DbUser, DbVerificationToken, NewDbUser, TokenConsumption,
    TokenSideEffect,
};

use super::{SessionRepository, UserRepository, VerificationTokenRepository};
use crate::error::{AuthError, AuthResult};
use crate::types::{
    ConsumeOutcome, NewUser, RedemptionEffect, Session, TokenPurpose, User, UserId,
    VerificationToken,
};

/// Repository implementation over a shared [`Database`]
#[derive(Clone)]
pub struct PgStore {
    db: Arc<Database>,
}

impl PgStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn user_from_row(row: DbUser) -> AuthResult<User> {
    Ok(User {
        id: row.id,
        username: row.username,
        email: row.email,
        phone: row.phone,
        password_hash: row.password_hash,
        role: row.role,
        status: row.status.parse()?,
        failed_login_attempts: u32::try_from(row.failed_login_attempts).unwrap_or(0),
        locked_until: row.locked_until,
        email_verified_at: row.email_verified_at,
        phone_verified_at: row.phone_verified_at,
        last_login_at: row.last_login_at,
        created_at: row.created_at,
    })
}

fn session_from_row(row: DbSession) -> AuthResult<Session> {
    Ok(Session {
        id: row.id,
        user_id: row.user_id,
        refresh_token_hash: row.refresh_token_hash,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        status: row.status.parse()?,
        last_activity: row.last_activity_at,
        created_at: row.created_at,
    })
}

fn token_from_row(row: DbVerificationToken) -> AuthResult<VerificationToken> {
    Ok(VerificationToken {
        id: row.id,
        user_id: row.user_id,
        token_hash: row.token_hash,
        purpose: row.purpose.parse()?,
        expires_at: row.expires_at,
        used_at: row.used_at,
        created_at: row.created_at,
    })
}

fn consume_outcome(outcome: TokenConsumption) -> ConsumeOutcome {
    match outcome {
        TokenConsumption::Consumed { sessions_revoked } => {
            ConsumeOutcome::Consumed { sessions_revoked }
        }
        TokenConsumption::AlreadyUsed => ConsumeOutcome::AlreadyUsed,
        TokenConsumption::Expired => ConsumeOutcome::Expired,
        TokenConsumption::Missing => ConsumeOutcome::Missing,
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, user: NewUser) -> AuthResult<User> {
        let row = self
            .db
            .user_repo()
            .create(NewDbUser {
                username: &user.username,
                email: &user.email,
                phone: user.phone.as_deref(),
                password_hash: &user.password_hash,
                role: &user.role,
                status: user.status.as_str(),
            })
            .await
            .map_err(|e| match e {
                DbError::Duplicate(_) => AuthError::UserAlreadyExists,
                other => other.into(),
            })?;

        user_from_row(row)
    }

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        self.db.user_repo().find_by_id(id).await?.map(user_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        self.db
            .user_repo()
            .find_by_username(username)
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        self.db
            .user_repo()
            .find_by_email(email)
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn find_by_identifier(&self, identifier: &str) -> AuthResult<Option<User>> {
        self.db
            .user_repo()
            .find_by_identifier(identifier)
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn record_failed_login(
        &self,
        id: UserId,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> AuthResult<Option<User>> {
        let threshold = i32::try_from(threshold).unwrap_or(i32::MAX);
        self.db
            .user_repo()
            .record_failed_login(id, threshold, lock_until)
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn reset_failed_logins(&self, id: UserId) -> AuthResult<()> {
        Ok(self.db.user_repo().reset_failed_logins(id).await?)
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> AuthResult<()> {
        Ok(self.db.user_repo().touch_last_login(id, at).await?)
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn create(&self, session: &Session) -> AuthResult<()> {
        self.db
            .session_repo()
            .create(
                session.id,
                session.user_id,
                &session.refresh_token_hash,
                session.ip_address.as_deref(),
                session.user_agent.as_deref(),
                session.created_at,
            )
            .await?;
        Ok(())
    }

    async fn find_active_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>> {
        self.db
            .session_repo()
            .find_active_by_token_hash(token_hash)
            .await?
            .map(session_from_row)
            .transpose()
    }

    async fn rotate(
        &self,
        id: Uuid,
        old_hash: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        Ok(self.db.session_repo().rotate(id, old_hash, new_hash, now).await?)
    }

    async fn revoke(&self, id: Uuid) -> AuthResult<bool> {
        Ok(self.db.session_repo().revoke(id).await?)
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<u64> {
        Ok(self.db.session_repo().revoke_all_for_user(user_id).await?)
    }

    async fn list_active(&self, user_id: UserId) -> AuthResult<Vec<Session>> {
        self.db
            .session_repo()
            .list_active(user_id)
            .await?
            .into_iter()
            .map(session_from_row)
            .collect()
    }

    async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        Ok(self.db.session_repo().delete_inactive_before(cutoff).await?)
    }
}

#[async_trait]
impl VerificationTokenRepository for PgStore {
    async fn create(&self, token: &VerificationToken) -> AuthResult<()> {
        self.db
            .verification_repo()
            .create(
                token.id,
                token.user_id,
                &token.token_hash,
                token.purpose.as_str(),
                token.expires_at,
                token.created_at,
            )
            .await?;
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> AuthResult<Option<VerificationToken>> {
        self.db
            .verification_repo()
            .find_by_hash(token_hash, purpose.as_str())
            .await?
            .map(token_from_row)
            .transpose()
    }

    async fn consume(
        &self,
        id: Uuid,
        effect: &RedemptionEffect,
        now: DateTime<Utc>,
    ) -> AuthResult<ConsumeOutcome> {
        let effect = match effect {
            RedemptionEffect::None => TokenSideEffect::None,
            RedemptionEffect::VerifyEmail => TokenSideEffect::VerifyEmail,
            RedemptionEffect::SetPassword(hash) => TokenSideEffect::SetPassword(hash),
        };
        let outcome = self.db.verification_repo().consume(id, effect, now).await?;
        Ok(consume_outcome(outcome))
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        Ok(self.db.verification_repo().delete_expired_before(cutoff).await?)
    }
}
