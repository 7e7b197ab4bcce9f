//! Outbound notifications
//!
//! The service hands raw verification secrets to a [`Notifier`] and moves on.
//! Delivery errors are logged by the caller and never retried here.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AuthError, AuthResult};

/// Email delivery seam
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification_email(&self, email: &str, raw_token: &str) -> AuthResult<()>;

    async fn send_password_reset_email(
        &self,
        email: &str,
        raw_token: &str,
        ttl_minutes: i64,
    ) -> AuthResult<()>;
}

/// Writes notifications to the log instead of sending mail
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification_email(&self, email: &str, raw_token: &str) -> AuthResult<()> {
        info!(email = email, "Verification email queued");
        debug!(email = email, token = raw_token, "Verification email body");
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        email: &str,
        raw_token: &str,
        ttl_minutes: i64,
    ) -> AuthResult<()> {
        info!(email = email, ttl_minutes = ttl_minutes, "Password reset email queued");
        debug!(email = email, token = raw_token, "Password reset email body");
        Ok(())
    }
}

/// A notification captured by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    Verification {
        email: String,
        token: String,
    },
    PasswordReset {
        email: String,
        token: String,
        ttl_minutes: i64,
    },
}

impl SentNotification {
    pub fn token(&self) -> &str {
        match self {
            Self::Verification { token, .. } | Self::PasswordReset { token, .. } => token,
        }
    }
}

/// Keeps every notification in memory; optionally fails every send
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose sends all fail after recording
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }

    pub async fn last_token(&self) -> Option<String> {
        self.sent.lock().await.last().map(|n| n.token().to_string())
    }

    async fn record(&self, notification: SentNotification) -> AuthResult<()> {
        self.sent.lock().await.push(notification);
        if self.fail {
            return Err(AuthError::Internal("mail relay unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification_email(&self, email: &str, raw_token: &str) -> AuthResult<()> {
        self.record(SentNotification::Verification {
            email: email.to_string(),
            token: raw_token.to_string(),
        })
        .await
    }

    async fn send_password_reset_email(
        &self,
        email: &str,
        raw_token: &str,
        ttl_minutes: i64,
    ) -> AuthResult<()> {
        self.record(SentNotification::PasswordReset {
            email: email.to_string(),
            token: raw_token.to_string(),
            ttl_minutes,
        })
        .await
    }
}
