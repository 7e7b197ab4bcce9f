//! Verification Token Service
//!
//! Single-use, expiring secrets for email confirmation and password reset.
//! The raw value leaves this module exactly once, from [`VerificationService::issue`];
//! storage only ever sees its SHA-256.
//!
//! Tokens carry their purpose, and lookups filter on it, so an email token can
//! never authorize a password reset.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::jwt::{generate_secret, hash_secret};
use crate::store::{UserRepository, VerificationTokenRepository};
use crate::types::{
    ConsumeOutcome, RedemptionEffect, TokenPurpose, User, UserId, VerificationToken,
};

/// Verification token service
#[derive(Clone)]
pub struct VerificationService {
    tokens: Arc<dyn VerificationTokenRepository>,
    users: Arc<dyn UserRepository>,
}

impl VerificationService {
    pub fn new(tokens: Arc<dyn VerificationTokenRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { tokens, users }
    }

    /// Issue a token for `user_id`, valid for `ttl_minutes`. Returns the raw value.
    pub async fn issue(
        &self,
        user_id: UserId,
        purpose: TokenPurpose,
        ttl_minutes: i64,
    ) -> AuthResult<String> {
        let raw = generate_secret();
        let now = Utc::now();
        let expires_at = Duration::try_minutes(ttl_minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Config(format!("token lifetime out of range: {} minutes", ttl_minutes))
            })?;

        let token = VerificationToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_secret(&raw),
            purpose,
            expires_at,
            used_at: None,
            created_at: now,
        };
        self.tokens.create(&token).await?;

        debug!(
            token_id = %token.id,
            user_id = user_id,
            purpose = purpose.as_str(),
            "Verification token issued"
        );

        Ok(raw)
    }

    /// Check a raw token without consuming it.
    ///
    /// Fails with `TokenNotFound` (unknown, other purpose, or owner deleted),
    /// then `TokenExpired`, then `TokenAlreadyUsed`.
    pub async fn inspect(
        &self,
        raw_token: &str,
        purpose: TokenPurpose,
    ) -> AuthResult<(User, VerificationToken)> {
        let token = self
            .tokens
            .find_by_hash(&hash_secret(raw_token), purpose)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        let user = self
            .users
            .find_by_id(token.user_id)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if token.is_expired(Utc::now()) {
            return Err(AuthError::TokenExpired);
        }

        if token.is_used() {
            return Err(AuthError::TokenAlreadyUsed);
        }

        Ok((user, token))
    }

    /// Mark an inspected token used together with `effect`.
    ///
    /// Expiry is checked again at the write, so a token that lapses after
    /// [`inspect`](Self::inspect) is still `TokenExpired`. Losing a concurrent
    /// race yields `TokenAlreadyUsed`. Returns the used token and the number of
    /// sessions the effect revoked.
    pub async fn consume(
        &self,
        token: &VerificationToken,
        effect: &RedemptionEffect,
    ) -> AuthResult<(VerificationToken, u64)> {
        let now = Utc::now();

        match self.tokens.consume(token.id, effect, now).await? {
            ConsumeOutcome::Consumed { sessions_revoked } => Ok((
                VerificationToken {
                    used_at: Some(now),
                    ..token.clone()
                },
                sessions_revoked,
            )),
            ConsumeOutcome::AlreadyUsed => {
                debug!(token_id = %token.id, "Verification token consumed concurrently");
                Err(AuthError::TokenAlreadyUsed)
            }
            ConsumeOutcome::Expired => Err(AuthError::TokenExpired),
            ConsumeOutcome::Missing => Err(AuthError::TokenNotFound),
        }
    }

    /// Inspect and consume in one call
    pub async fn redeem(
        &self,
        raw_token: &str,
        purpose: TokenPurpose,
        effect: &RedemptionEffect,
    ) -> AuthResult<(User, VerificationToken)> {
        let (user, token) = self.inspect(raw_token, purpose).await?;
        let (token, _) = self.consume(&token, effect).await?;
        Ok((user, token))
    }

    /// Delete tokens that expired before `cutoff`
    pub async fn cleanup_expired(&self, cutoff: chrono::DateTime<Utc>) -> AuthResult<u64> {
        self.tokens.delete_expired_before(cutoff).await
    }
}
