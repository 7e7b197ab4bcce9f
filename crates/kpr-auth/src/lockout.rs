//! Lockout Policy
//!
//! Failed-login tracking on the user record itself:
//! - Each wrong password increments the counter in one atomic store write
//! - Reaching the threshold stamps `locked_until = now + lock_duration`
//! - A correct password while unlocked resets the counter
//!
//! A lock whose time has passed no longer blocks login. The counter is not
//! reset by expiry, so the next failure locks again immediately.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::LockoutConfig;
use crate::error::{AuthError, AuthResult};
use crate::store::UserRepository;
use crate::types::{User, UserId};

/// Failed-login lockout policy
#[derive(Clone)]
pub struct LockoutPolicy {
    users: Arc<dyn UserRepository>,
    config: LockoutConfig,
}

impl LockoutPolicy {
    pub fn new(users: Arc<dyn UserRepository>, config: LockoutConfig) -> Self {
        Self { users, config }
    }

    /// Whether the user is locked at `now`
    pub fn is_locked(&self, user: &User, now: DateTime<Utc>) -> bool {
        matches!(user.locked_until, Some(until) if until > now)
    }

    /// Time left on an active lock
    pub fn lock_remaining(&self, user: &User, now: DateTime<Utc>) -> Option<std::time::Duration> {
        user.locked_until
            .filter(|until| *until > now)
            .and_then(|until| (until - now).to_std().ok())
    }

    /// Reject a login attempt on a locked account
    pub fn check(&self, user: &User, now: DateTime<Utc>) -> AuthResult<()> {
        match self.lock_remaining(user, now) {
            Some(remaining) => Err(AuthError::account_locked(remaining)),
            None => Ok(()),
        }
    }

    /// Record a wrong password. Returns the updated user, or `None` if the
    /// user disappeared in the meantime.
    pub async fn on_failure(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<Option<User>> {
        let lock_until = Duration::from_std(self.config.lock_duration)
            .ok()
            .and_then(|duration| now.checked_add_signed(duration))
            .ok_or_else(|| {
                AuthError::Config(format!(
                    "lock duration out of range: {:?}",
                    self.config.lock_duration
                ))
            })?;

        let updated = self
            .users
            .record_failed_login(user_id, self.config.max_failed_attempts, lock_until)
            .await?;

        if let Some(ref user) = updated {
            if self.is_locked(user, now) {
                warn!(
                    user_id = user.id,
                    failed_attempts = user.failed_login_attempts,
                    lockout_seconds = self.config.lock_duration.as_secs(),
                    "Account locked due to failed login attempts"
                );
            }
        }

        Ok(updated)
    }

    /// Record a successful login; clears the counter even if `user` looks clean
    pub async fn on_success(&self, user: &User) -> AuthResult<()> {
        self.users.reset_failed_logins(user.id).await
    }

    /// Clear lock and counter (administrative)
    pub async fn unlock(&self, user_id: UserId) -> AuthResult<()> {
        self.users.reset_failed_logins(user_id).await?;
        info!(user_id = user_id, "Account unlocked");
        Ok(())
    }
}
