//! Authentication configuration
//!
//! Centralized configuration for all authentication components with
//! secure defaults. The whole struct is built once at startup and handed to
//! [`AuthService::new`](crate::AuthService::new); nothing reads ambient state
//! after that.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// JWT configuration
    #[serde(default)]
    pub jwt: JwtConfig,
    /// Password hashing configuration
    #[serde(default)]
    pub password: PasswordConfig,
    /// Failed-login lockout configuration
    #[serde(default)]
    pub lockout: LockoutConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Verification token configuration
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// JWT token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for signing tokens (should be at least 256 bits)
    pub secret: String,
    /// Access token lifetime
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,
    /// Refresh token lifetime
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
    /// Token issuer claim
    pub issuer: String,
    /// Token audience claim
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(), // Must be set in production
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            issuer: "kpr".to_string(),
            audience: "kpr-api".to_string(),
        }
    }
}

/// Password hashing configuration (Argon2id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in KiB (OWASP recommends 19456 KiB = 19 MiB minimum)
    pub memory_cost: u32,
    /// Time cost (iterations) - OWASP recommends 2 minimum
    pub time_cost: u32,
    /// Parallelism factor
    pub parallelism: u32,
    /// Output hash length in bytes
    pub hash_length: u32,
    /// Pepper (additional secret, optional)
    pub pepper: Option<String>,
    /// Minimum password length
    pub min_password_length: usize,
    /// Maximum password length (to prevent DoS)
    pub max_password_length: usize,
    /// Require at least one uppercase letter
    pub require_uppercase: bool,
    /// Require at least one lowercase letter
    pub require_lowercase: bool,
    /// Require at least one digit
    pub require_digit: bool,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
            hash_length: 32,
            pepper: None,
            min_password_length: 8,
            max_password_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
        }
    }
}

/// Account lockout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Failed attempts that trigger a lock
    pub max_failed_attempts: u32,
    /// How long the account stays locked
    #[serde(with = "humantime_serde")]
    pub lock_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 3,
            lock_duration: Duration::from_secs(15 * 60), // 15 minutes
        }
    }
}

/// Session management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are deleted by the cleanup sweep
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    /// Maximum stored length of the client user agent
    pub max_user_agent_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
            max_user_agent_length: 512,
        }
    }
}

/// Verification token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Email verification token lifetime in minutes
    pub email_verification_ttl_minutes: i64,
    /// Password reset token lifetime in minutes
    pub password_reset_ttl_minutes: i64,
    /// Expired tokens are kept this long before the sweep deletes them
    #[serde(with = "humantime_serde")]
    pub expired_retention: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            email_verification_ttl_minutes: 24 * 60,
            password_reset_ttl_minutes: 15,
            expired_retention: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
        }
    }
}

impl AuthConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.jwt.secret.is_empty() {
            errors.push("JWT secret must be set".to_string());
        } else if self.jwt.secret.len() < 32 {
            errors.push("JWT secret should be at least 256 bits (32 bytes)".to_string());
        }

        if self.jwt.access_token_lifetime >= self.jwt.refresh_token_lifetime {
            errors.push("Access token lifetime must be shorter than refresh token lifetime".to_string());
        }

        if self.password.min_password_length < 8 {
            errors.push("Minimum password length should be at least 8".to_string());
        }

        if self.password.min_password_length > self.password.max_password_length {
            errors.push("Minimum password length exceeds maximum".to_string());
        }

        if self.lockout.max_failed_attempts == 0 {
            errors.push("Lockout threshold must be at least 1".to_string());
        }

        if self.verification.email_verification_ttl_minutes <= 0
            || self.verification.password_reset_ttl_minutes <= 0
        {
            errors.push("Verification token lifetimes must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
