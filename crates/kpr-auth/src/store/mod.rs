//! Persistence seams
//!
//! The services only talk to these traits. Each method that must be race-free
//! under concurrent callers is a single conditional write in the
//! implementation:
//! - [`UserRepository::record_failed_login`] increments and locks in one step
//! - [`SessionRepository::rotate`] swaps the hash only if it still matches
//! - [`VerificationTokenRepository::consume`] flips `used_at` only if unset and
//!   unexpired, and commits the user and session changes with it
//!
//! Two implementations ship with the crate: [`PgStore`] over `kpr-db` and the
//! in-process [`MemoryStore`].

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AuthResult;
use crate::types::{
    ConsumeOutcome, NewUser, RedemptionEffect, Session, TokenPurpose, User, UserId,
    VerificationToken,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// User record store
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Fails with `UserAlreadyExists` on a username or email clash.
    async fn create(&self, user: NewUser) -> AuthResult<User>;

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Case-insensitive email lookup
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Username or email
    async fn find_by_identifier(&self, identifier: &str) -> AuthResult<Option<User>>;

    /// Atomically increment the failed-login counter, setting `locked_until` to
    /// `lock_until` once the new count reaches `threshold`.
    async fn record_failed_login(
        &self,
        id: UserId,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> AuthResult<Option<User>>;

    /// Zero the counter and clear any lock
    async fn reset_failed_logins(&self, id: UserId) -> AuthResult<()>;

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> AuthResult<()>;
}

/// Session store
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> AuthResult<()>;

    async fn find_active_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>>;

    /// Compare-and-swap of the refresh token hash; `false` if it no longer matches
    async fn rotate(
        &self,
        id: Uuid,
        old_hash: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Revoke one session; `false` if it was not active
    async fn revoke(&self, id: Uuid) -> AuthResult<bool>;

    async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<u64>;

    async fn list_active(&self, user_id: UserId) -> AuthResult<Vec<Session>>;

    /// Delete sessions whose last activity is before `cutoff`
    async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64>;
}

/// Verification token store
#[async_trait]
pub trait VerificationTokenRepository: Send + Sync {
    async fn create(&self, token: &VerificationToken) -> AuthResult<()>;

    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> AuthResult<Option<VerificationToken>>;

    /// Mark the token used and apply `effect`, all or nothing.
    /// Only an unused token with `expires_at > now` is consumed.
    async fn consume(
        &self,
        id: Uuid,
        effect: &RedemptionEffect,
        now: DateTime<Utc>,
    ) -> AuthResult<ConsumeOutcome>;

    /// Delete tokens that expired before `cutoff`
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64>;
}
