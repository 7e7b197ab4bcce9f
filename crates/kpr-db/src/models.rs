//! Database models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// User Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub phone_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user row
#[derive(Debug, Clone)]
pub struct NewDbUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub status: &'a str,
}

// ============================================================================
// Session Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbSession {
    pub id: Uuid,
    pub user_id: i64,
    pub refresh_token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: String,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Verification Token Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbVerificationToken {
    pub id: Uuid,
    pub user_id: i64,
    pub token_hash: String,
    pub purpose: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// User-row change committed in the same transaction that consumes a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSideEffect<'a> {
    /// Consume the token only
    None,
    /// Stamp `email_verified_at` (kept if already set) and activate pending accounts
    VerifyEmail,
    /// Replace the password hash, clear lockout state and revoke every active session
    SetPassword(&'a str),
}

/// Result of a conditional token consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenConsumption {
    /// Marked used and side effect applied
    Consumed { sessions_revoked: u64 },
    AlreadyUsed,
    /// Unused but past `expires_at`; nothing written
    Expired,
    /// No such token (deleted by a sweep)
    Missing,
}
