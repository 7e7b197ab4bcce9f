//! Core authentication types
//!
//! Domain records shared by the stores and services, JWT claim shapes, and the
//! request/response payloads of the exposed operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthError;

/// User identifier as assigned by the user-record store
pub type UserId = i64;

// =============================================================================
// User Types
// =============================================================================

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Registered, email not yet confirmed
    PendingVerification,
    /// May log in
    Active,
    /// Blocked by an administrator
    Suspended,
    /// Closed or dormant
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingVerification => "PENDING_VERIFICATION",
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING_VERIFICATION" => Ok(Self::PendingVerification),
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(AuthError::Internal(format!("unknown user status: {}", other))),
        }
    }
}

/// User record as seen by the authentication subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    /// Argon2id PHC string, never the raw password
    pub password_hash: String,
    /// Role name, e.g. `USER`, `ADMIN`
    pub role: String,
    pub status: UserStatus,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub phone_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Fields for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub status: UserStatus,
}

// =============================================================================
// Session Types
// =============================================================================

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Revoked,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => kpr_db::STATUS_ACTIVE,
            Self::Revoked => kpr_db::STATUS_REVOKED,
        }
    }
}

impl FromStr for SessionStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            kpr_db::STATUS_ACTIVE => Ok(Self::Active),
            kpr_db::STATUS_REVOKED => Ok(Self::Revoked),
            other => Err(AuthError::Internal(format!("unknown session status: {}", other))),
        }
    }
}

/// Login session bound to a refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: Uuid,
    /// User ID
    pub user_id: UserId,
    /// SHA-256 of the current refresh token
    pub refresh_token_hash: String,
    /// Client IP address
    pub ip_address: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Active or revoked
    pub status: SessionStatus,
    /// Last login or refresh
    pub last_activity: DateTime<Utc>,
    /// Created at
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Client metadata captured with a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMetadata {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            user_agent: Some(user_agent.into()),
        }
    }
}

// =============================================================================
// Verification Token Types
// =============================================================================

/// What a verification token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "EMAIL_VERIFICATION",
            Self::PasswordReset => "PASSWORD_RESET",
        }
    }
}

impl FromStr for TokenPurpose {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMAIL_VERIFICATION" => Ok(Self::EmailVerification),
            "PASSWORD_RESET" => Ok(Self::PasswordReset),
            other => Err(AuthError::Internal(format!("unknown token purpose: {}", other))),
        }
    }
}

/// Single-use verification token (hash only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationToken {
    pub id: Uuid,
    pub user_id: UserId,
    pub token_hash: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// User change committed together with a token's `used_at` transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionEffect {
    None,
    /// Stamp email verification (first time only) and activate a pending account
    VerifyEmail,
    /// Store a new password hash, clear lockout state and revoke every active session
    SetPassword(String),
}

/// What a conditional token consumption did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Token marked used and effect applied
    Consumed { sessions_revoked: u64 },
    /// Another redemption got there first
    AlreadyUsed,
    /// Expired between inspection and consumption; nothing written
    Expired,
    /// Token no longer exists
    Missing,
}

// =============================================================================
// Token Types
// =============================================================================

/// Token type enum for JWT claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (username)
    pub sub: String,
    /// User ID
    pub uid: UserId,
    /// Role name
    pub role: String,
    /// Token type
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// JWT ID (unique identifier)
    pub jti: String,
}

/// JWT token pair (access + refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: String,
    /// Access token expiry (Unix timestamp)
    pub access_expires_at: i64,
    /// Refresh token expiry (Unix timestamp)
    pub refresh_expires_at: i64,
    /// Token type (always "Bearer")
    pub token_type: String,
}

impl TokenPair {
    pub fn new(
        access_token: String,
        refresh_token: String,
        access_expires_at: i64,
        refresh_expires_at: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: "Bearer".to_string(),
        }
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Username or email address
    pub identifier: String,
    /// Password
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    /// Token pair
    pub tokens: TokenPair,
    /// Session ID
    pub session_id: Uuid,
    /// User info
    pub user: UserProfile,
}

/// Refresh response
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub tokens: TokenPair,
    pub session_id: Uuid,
}

/// Basic user info for responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: UserStatus,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role.clone(),
            status: user.status,
            email_verified: user.email_verified_at.is_some(),
            phone_verified: user.phone_verified_at.is_some(),
            last_login_at: user.last_login_at,
        }
    }
}

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

/// Registration response
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub status: UserStatus,
}

/// Outcome of an email verification
#[derive(Debug, Clone, Serialize)]
pub struct EmailVerification {
    pub user_id: UserId,
    /// The address had already been confirmed by an earlier token
    pub already_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_status_round_trip_strings() {
        assert_eq!("ACTIVE".parse::<UserStatus>().unwrap(), UserStatus::Active);
        assert_eq!(
            "pending_verification".parse::<UserStatus>().unwrap(),
            UserStatus::PendingVerification
        );
        assert!("BANNED".parse::<UserStatus>().is_err());
        assert_eq!(UserStatus::Suspended.to_string(), "SUSPENDED");
    }

    #[test]
    fn test_token_purpose_serde() {
        let json = serde_json::to_string(&TokenPurpose::PasswordReset).unwrap();
        assert_eq!(json, "\"PASSWORD_RESET\"");
        assert_eq!(
            TokenPurpose::EmailVerification.as_str().parse::<TokenPurpose>().unwrap(),
            TokenPurpose::EmailVerification
        );
    }

    #[test]
    fn test_verification_token_expiry_boundary() {
        let now = Utc::now();
        let token = VerificationToken {
            id: Uuid::new_v4(),
            user_id: 1,
            token_hash: "h".to_string(),
            purpose: TokenPurpose::PasswordReset,
            expires_at: now,
            used_at: None,
            created_at: now,
        };
        assert!(token.is_expired(now));
        assert!(!token.is_expired(now - chrono::Duration::seconds(1)));
        assert!(!token.is_used());
    }

    #[test]
    fn test_session_status_strings() {
        assert_eq!(SessionStatus::Active.as_str(), "ACTIVE");
        assert_eq!("REVOKED".parse::<SessionStatus>().unwrap(), SessionStatus::Revoked);
    }
}
