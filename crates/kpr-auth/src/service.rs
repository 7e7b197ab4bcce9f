//! Authentication Service
//!
//! Orchestrates the token codec, password hashing, lockout policy, session and
//! verification token services against the user store. Every expected failure
//! comes back as an [`AuthError`] value.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwt::JwtService;
use crate::lockout::LockoutPolicy;
use crate::notify::Notifier;
use crate::password::PasswordService;
use crate::session::SessionService;
use crate::store::{SessionRepository, UserRepository, VerificationTokenRepository};
use crate::types::{
    EmailVerification, LoginRequest, LoginResponse, NewUser, RedemptionEffect, RefreshResponse,
    RegisterRequest, RegisterResponse, RequestMetadata, Session, TokenPurpose, UserId,
    UserProfile, UserStatus,
};
use crate::verification::VerificationService;

/// Role given to self-registered accounts
const DEFAULT_ROLE: &str = "USER";

/// Main authentication service
#[derive(Clone)]
pub struct AuthService {
    pub jwt: JwtService,
    pub password: PasswordService,
    pub lockout: LockoutPolicy,
    pub sessions: SessionService,
    pub verification: VerificationService,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new auth service with all components
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        tokens: Arc<dyn VerificationTokenRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            jwt: JwtService::new(config.jwt.clone()),
            password: PasswordService::new(config.password.clone()),
            lockout: LockoutPolicy::new(users.clone(), config.lockout.clone()),
            sessions: SessionService::new(sessions, config.session.clone()),
            verification: VerificationService::new(tokens, users.clone()),
            users,
            notifier,
            config,
        }
    }

    /// Build from one store implementing every repository
    pub fn with_store<S>(config: AuthConfig, store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self
    where
        S: UserRepository + SessionRepository + VerificationTokenRepository + 'static,
    {
        Self::new(config, store.clone(), store.clone(), store, notifier)
    }

    /// Get the config reference
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // =========================================================================
    // Login / Refresh / Logout
    // =========================================================================

    /// Authenticate with username-or-email and password
    pub async fn login(
        &self,
        request: LoginRequest,
        metadata: RequestMetadata,
    ) -> AuthResult<LoginResponse> {
        let now = Utc::now();

        let Some(user) = self.users.find_by_identifier(&request.identifier).await? else {
            info!(identifier = %request.identifier, "Login failed: unknown identifier");
            return Err(AuthError::InvalidCredentials);
        };

        self.lockout.check(&user, now)?;

        if !self.password.verify_password(&request.password, &user.password_hash)? {
            let attempts = self
                .lockout
                .on_failure(user.id, now)
                .await?
                .map(|u| u.failed_login_attempts);
            warn!(
                user_id = user.id,
                failed_attempts = attempts,
                ip = metadata.ip_address.as_deref(),
                "Login failed: wrong password"
            );
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active() {
            info!(user_id = user.id, status = %user.status, "Login rejected: account not active");
            return Err(AuthError::AccountNotActive);
        }

        self.lockout.on_success(&user).await?;
        self.users.touch_last_login(user.id, now).await?;

        let tokens = self.jwt.issue_token_pair(&user.username, user.id, &user.role)?;
        let session = self
            .sessions
            .create(user.id, &tokens.refresh_token, &metadata)
            .await?;

        info!(
            user_id = user.id,
            session_id = %session.id,
            ip = metadata.ip_address.as_deref(),
            "User logged in"
        );

        let mut profile = UserProfile::from(&user);
        profile.last_login_at = Some(now);

        Ok(LoginResponse {
            tokens,
            session_id: session.id,
            user: profile,
        })
    }

    /// Exchange a refresh token for a new pair, rotating the session
    pub async fn refresh(&self, raw_refresh_token: &str) -> AuthResult<RefreshResponse> {
        let session = self
            .sessions
            .find_active_by_refresh_token(raw_refresh_token)
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)?;

        let claims = self
            .jwt
            .validate_refresh_token(raw_refresh_token)
            .map_err(|_| AuthError::RefreshTokenInvalid)?;
        if claims.uid != session.user_id {
            warn!(session_id = %session.id, "Refresh token does not belong to session owner");
            return Err(AuthError::RefreshTokenInvalid);
        }

        let user = self
            .users
            .find_by_username(&claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let tokens = self.jwt.issue_token_pair(&user.username, user.id, &user.role)?;
        let session = self.sessions.rotate(&session, &tokens.refresh_token).await?;

        info!(user_id = user.id, session_id = %session.id, "Tokens refreshed");

        Ok(RefreshResponse {
            tokens,
            session_id: session.id,
        })
    }

    /// Revoke the session behind a refresh token. Unknown tokens are a no-op.
    pub async fn logout(&self, raw_refresh_token: &str) -> AuthResult<()> {
        if let Some(session) = self
            .sessions
            .find_active_by_refresh_token(raw_refresh_token)
            .await?
        {
            self.sessions.revoke(&session).await?;
            info!(user_id = session.user_id, session_id = %session.id, "User logged out");
        }
        Ok(())
    }

    /// Revoke every session of the access token's owner
    pub async fn logout_all(&self, access_token: &str) -> AuthResult<u64> {
        let claims = self.jwt.validate_access_token(access_token)?;
        self.sessions.revoke_all(claims.uid).await
    }

    /// Profile of the access token's owner
    pub async fn get_profile(&self, access_token: &str) -> AuthResult<UserProfile> {
        let claims = self.jwt.validate_access_token(access_token)?;
        let user = self
            .users
            .find_by_id(claims.uid)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserProfile::from(&user))
    }

    /// Active sessions of a user
    pub async fn list_sessions(&self, user_id: UserId) -> AuthResult<Vec<Session>> {
        self.sessions.list_active(user_id).await
    }

    // =========================================================================
    // Registration / Email Verification
    // =========================================================================

    /// Create a pending account and send its verification email
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<RegisterResponse> {
        if request.password != request.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        self.password.validate_password_strength(&request.password)?;

        let password_hash = self.password.hash_password(&request.password)?;
        let user = self
            .users
            .create(NewUser {
                username: request.username,
                email: request.email,
                phone: request.phone,
                password_hash,
                role: DEFAULT_ROLE.to_string(),
                status: UserStatus::PendingVerification,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "User registered");

        self.generate_email_verification_token(user.id).await?;

        Ok(RegisterResponse {
            user_id: user.id,
            username: user.username,
            email: user.email,
            status: user.status,
        })
    }

    /// Issue an email verification token and mail it. Returns the raw token.
    pub async fn generate_email_verification_token(&self, user_id: UserId) -> AuthResult<String> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let raw = self
            .verification
            .issue(
                user.id,
                TokenPurpose::EmailVerification,
                self.config.verification.email_verification_ttl_minutes,
            )
            .await?;

        if let Err(e) = self.notifier.send_verification_email(&user.email, &raw).await {
            warn!(user_id = user.id, error = %e, "Failed to send verification email");
        }

        Ok(raw)
    }

    /// Redeem an email verification token
    pub async fn verify_email(&self, raw_token: &str) -> AuthResult<EmailVerification> {
        let (user, token) = self
            .verification
            .inspect(raw_token, TokenPurpose::EmailVerification)
            .await?;
        let already_verified = user.is_email_verified();

        self.verification
            .consume(&token, &RedemptionEffect::VerifyEmail)
            .await?;

        info!(user_id = user.id, already_verified = already_verified, "Email verified");

        Ok(EmailVerification {
            user_id: user.id,
            already_verified,
        })
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Send a password reset token to a registered email
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::EmailNotFound)?;

        let ttl_minutes = self.config.verification.password_reset_ttl_minutes;
        let raw = self
            .verification
            .issue(user.id, TokenPurpose::PasswordReset, ttl_minutes)
            .await?;

        if let Err(e) = self
            .notifier
            .send_password_reset_email(&user.email, &raw, ttl_minutes)
            .await
        {
            warn!(user_id = user.id, error = %e, "Failed to send password reset email");
        }

        info!(user_id = user.id, "Password reset requested");
        Ok(())
    }

    /// Set a new password with a reset token and log the user out everywhere.
    /// All or nothing: a failed reset changes neither the password nor any session.
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> AuthResult<()> {
        let (user, token) = self
            .verification
            .inspect(raw_token, TokenPurpose::PasswordReset)
            .await?;

        if self.password.verify_password(new_password, &user.password_hash)? {
            return Err(AuthError::PasswordUnchanged);
        }
        self.password.validate_password_strength(new_password)?;

        // Password, lockout and session revocation commit with the token
        let password_hash = self.password.hash_password(new_password)?;
        let (_, revoked) = self
            .verification
            .consume(&token, &RedemptionEffect::SetPassword(password_hash))
            .await?;

        info!(user_id = user.id, revoked_sessions = revoked, "Password reset");

        Ok(())
    }

    // =========================================================================
    // Administration / Maintenance
    // =========================================================================

    /// Clear a lockout
    pub async fn unlock_account(&self, user_id: UserId) -> AuthResult<()> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.lockout.unlock(user_id).await
    }

    /// Delete sessions idle longer than the configured retention
    pub async fn cleanup_expired_sessions(&self) -> AuthResult<u64> {
        let cutoff = retention_cutoff(self.config.session.retention, "session retention")?;
        self.sessions.cleanup_expired(cutoff).await
    }

    /// Delete verification tokens expired longer than the configured retention
    pub async fn cleanup_expired_tokens(&self) -> AuthResult<u64> {
        let cutoff = retention_cutoff(self.config.verification.expired_retention, "token retention")?;
        self.verification.cleanup_expired(cutoff).await
    }
}

/// `now - retention`, or a config error when it falls outside chrono's range
fn retention_cutoff(retention: std::time::Duration, what: &str) -> AuthResult<DateTime<Utc>> {
    chrono::Duration::from_std(retention)
        .ok()
        .and_then(|retention| Utc::now().checked_sub_signed(retention))
        .ok_or_else(|| AuthError::Config(format!("{} out of range: {:?}", what, retention)))
}
