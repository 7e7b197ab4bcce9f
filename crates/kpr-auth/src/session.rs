//! Session Management Service
//!
//! Login sessions bound to refresh tokens:
//! - Only the SHA-256 of the refresh token is stored
//! - Rotation swaps the hash atomically, so a used refresh token stops working
//! - Revocation is a status flip; the cleanup sweep deletes idle rows

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwt::hash_secret;
use crate::store::SessionRepository;
use crate::types::{RequestMetadata, Session, SessionStatus, UserId};

/// Session service for managing user sessions
#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    config: SessionConfig,
}

impl SessionService {
    /// Create a new session service
    pub fn new(sessions: Arc<dyn SessionRepository>, config: SessionConfig) -> Self {
        Self { sessions, config }
    }

    /// Persist a new active session for a raw refresh token
    pub async fn create(
        &self,
        user_id: UserId,
        raw_refresh_token: &str,
        metadata: &RequestMetadata,
    ) -> AuthResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            refresh_token_hash: hash_secret(raw_refresh_token),
            ip_address: metadata.ip_address.clone(),
            user_agent: metadata
                .user_agent
                .as_deref()
                .map(|ua| truncate(ua, self.config.max_user_agent_length)),
            status: SessionStatus::Active,
            last_activity: now,
            created_at: now,
        };

        self.sessions.create(&session).await?;
        debug!(session_id = %session.id, user_id = user_id, "Session created");

        Ok(session)
    }

    /// Active session holding this refresh token, if any
    pub async fn find_active_by_refresh_token(
        &self,
        raw_refresh_token: &str,
    ) -> AuthResult<Option<Session>> {
        self.sessions
            .find_active_by_token_hash(&hash_secret(raw_refresh_token))
            .await
    }

    /// Bind the session to a new refresh token. Fails with `RefreshTokenInvalid`
    /// if another caller rotated or revoked it first.
    pub async fn rotate(&self, session: &Session, new_raw_refresh_token: &str) -> AuthResult<Session> {
        let now = Utc::now();
        let new_hash = hash_secret(new_raw_refresh_token);

        let swapped = self
            .sessions
            .rotate(session.id, &session.refresh_token_hash, &new_hash, now)
            .await?;
        if !swapped {
            debug!(session_id = %session.id, "Lost rotation race");
            return Err(AuthError::RefreshTokenInvalid);
        }

        Ok(Session {
            refresh_token_hash: new_hash,
            last_activity: now,
            ..session.clone()
        })
    }

    /// Revoke a session; no-op if it is already revoked
    pub async fn revoke(&self, session: &Session) -> AuthResult<bool> {
        let revoked = self.sessions.revoke(session.id).await?;
        if revoked {
            info!(session_id = %session.id, user_id = session.user_id, "Session revoked");
        }
        Ok(revoked)
    }

    /// Revoke every active session of a user
    pub async fn revoke_all(&self, user_id: UserId) -> AuthResult<u64> {
        let count = self.sessions.revoke_all_for_user(user_id).await?;
        info!(user_id = user_id, revoked = count, "Revoked all sessions for user");
        Ok(count)
    }

    /// List a user's active sessions
    pub async fn list_active(&self, user_id: UserId) -> AuthResult<Vec<Session>> {
        self.sessions.list_active(user_id).await
    }

    /// Delete sessions idle since before `cutoff`
    pub async fn cleanup_expired(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = self.sessions.delete_inactive_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted = deleted, cutoff = %cutoff, "Expired sessions deleted");
        }
        Ok(deleted)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
