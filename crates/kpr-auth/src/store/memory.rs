//! In-process repositories
//!
//! One lock guards all three tables so that a token redemption and its user
//! change land together, the same guarantee the SQL transaction gives.
//! Used by tests and single-node tooling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{SessionRepository, UserRepository, VerificationTokenRepository};
use crate::error::{AuthError, AuthResult};
use crate::types::{
    ConsumeOutcome, NewUser, RedemptionEffect, Session, SessionStatus, TokenPurpose, User, UserId,
    UserStatus, VerificationToken,
};

#[derive(Default)]
struct Tables {
    next_user_id: UserId,
    users: HashMap<UserId, User>,
    sessions: HashMap<Uuid, Session>,
    tokens: HashMap<Uuid, VerificationToken>,
}

/// Shared in-memory store; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every verification token ever issued to a user, used or not
    pub async fn tokens_for_user(&self, user_id: UserId) -> Vec<VerificationToken> {
        let tables = self.tables.read().await;
        tables
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// All sessions of a user regardless of status
    pub async fn sessions_for_user(&self, user_id: UserId) -> Vec<Session> {
        let tables = self.tables.read().await;
        tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Total number of stored verification tokens
    pub async fn token_count(&self) -> usize {
        self.tables.read().await.tokens.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> AuthResult<User> {
        let mut tables = self.tables.write().await;

        let clash = tables.users.values().any(|u| {
            u.username == user.username || u.email.eq_ignore_ascii_case(&user.email)
        });
        if clash {
            return Err(AuthError::UserAlreadyExists);
        }

        tables.next_user_id += 1;
        let record = User {
            id: tables.next_user_id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            role: user.role,
            status: user.status,
            failed_login_attempts: 0,
            locked_until: None,
            email_verified_at: None,
            phone_verified_at: None,
            last_login_at: None,
            created_at: Utc::now(),
        };
        tables.users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> AuthResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == identifier || u.email.eq_ignore_ascii_case(identifier))
            .cloned())
    }

    async fn record_failed_login(
        &self,
        id: UserId,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> AuthResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };

        user.failed_login_attempts = user.failed_login_attempts.saturating_add(1);
        if user.failed_login_attempts >= threshold {
            user.locked_until = Some(lock_until);
        }

        Ok(Some(user.clone()))
    }

    async fn reset_failed_logins(&self, id: UserId) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.failed_login_attempts = 0;
            user.locked_until = None;
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create(&self, session: &Session) -> AuthResult<()> {
        let mut tables = self.tables.write().await;

        if tables
            .sessions
            .values()
            .any(|s| s.refresh_token_hash == session.refresh_token_hash)
        {
            return Err(AuthError::Database("duplicate refresh token hash".to_string()));
        }

        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_active_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| s.is_active() && s.refresh_token_hash == token_hash)
            .cloned())
    }

    async fn rotate(
        &self,
        id: Uuid,
        old_hash: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&id) {
            Some(session) if session.is_active() && session.refresh_token_hash == old_hash => {
                session.refresh_token_hash = new_hash.to_string();
                session.last_activity = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, id: Uuid) -> AuthResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&id) {
            Some(session) if session.is_active() => {
                session.status = SessionStatus::Revoked;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<u64> {
        let mut tables = self.tables.write().await;
        let mut revoked = 0;
        for session in tables.sessions.values_mut() {
            if session.user_id == user_id && session.is_active() {
                session.status = SessionStatus::Revoked;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn list_active(&self, user_id: UserId) -> AuthResult<Vec<Session>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }

    async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.last_activity >= cutoff);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl VerificationTokenRepository for MemoryStore {
    async fn create(&self, token: &VerificationToken) -> AuthResult<()> {
        let mut tables = self.tables.write().await;

        if tables.tokens.values().any(|t| t.token_hash == token.token_hash) {
            return Err(AuthError::Database("duplicate token hash".to_string()));
        }

        tables.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> AuthResult<Option<VerificationToken>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .values()
            .find(|t| t.token_hash == token_hash && t.purpose == purpose)
            .cloned())
    }

    async fn consume(
        &self,
        id: Uuid,
        effect: &RedemptionEffect,
        now: DateTime<Utc>,
    ) -> AuthResult<ConsumeOutcome> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let user_id = match tables.tokens.get_mut(&id) {
            None => return Ok(ConsumeOutcome::Missing),
            Some(token) if token.is_used() => return Ok(ConsumeOutcome::AlreadyUsed),
            Some(token) if token.is_expired(now) => return Ok(ConsumeOutcome::Expired),
            Some(token) => {
                token.used_at = Some(now);
                token.user_id
            }
        };

        let mut sessions_revoked = 0;
        if let Some(user) = tables.users.get_mut(&user_id) {
            match effect {
                RedemptionEffect::None => {}
                RedemptionEffect::VerifyEmail => {
                    user.email_verified_at.get_or_insert(now);
                    if user.status == UserStatus::PendingVerification {
                        user.status = UserStatus::Active;
                    }
                }
                RedemptionEffect::SetPassword(hash) => {
                    user.password_hash = hash.clone();
                    user.failed_login_attempts = 0;
                    user.locked_until = None;

                    for session in tables.sessions.values_mut() {
                        if session.user_id == user_id && session.is_active() {
                            session.status = SessionStatus::Revoked;
                            sessions_revoked += 1;
                        }
                    }
                }
            }
        }

        Ok(ConsumeOutcome::Consumed { sessions_revoked })
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.tokens.len();
        tables.tokens.retain(|_, t| t.expires_at >= cutoff);
        Ok((before - tables.tokens.len()) as u64)
    }
}
