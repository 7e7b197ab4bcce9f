//! Authentication error types
//!
//! Every expected failure of the authentication flows is a variant here and is
//! returned as a value. Errors are designed to be:
//! - Informative for logging/debugging
//! - Safe for external exposure (no sensitive data leakage)
//! - Convertible to HTTP status codes

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kpr_db::DbError;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    // =========================================================================
    // Credential Errors
    // =========================================================================
    /// Unknown identifier or wrong password. Both cases look identical to the
    /// caller so accounts cannot be enumerated.
    #[error("Invalid username, email or password")]
    InvalidCredentials,

    /// Account is locked due to too many failed attempts
    #[error("Account is locked, try again in {retry_after} seconds")]
    AccountLocked {
        /// Seconds until the account is unlocked
        retry_after: u64,
    },

    /// Credentials were valid but the account may not log in
    #[error("Account is not active")]
    AccountNotActive,

    // =========================================================================
    // Token Errors
    // =========================================================================
    /// No active session for the supplied refresh token
    #[error("Invalid refresh token")]
    RefreshTokenInvalid,

    /// Access token is malformed or has a bad signature
    #[error("Invalid token")]
    InvalidToken,

    /// Access token has expired
    #[error("Token has expired")]
    AccessTokenExpired,

    /// Token type mismatch (expected access, got refresh, etc.)
    #[error("Invalid token type")]
    InvalidTokenType,

    // =========================================================================
    // Verification Token Errors
    // =========================================================================
    /// No verification token matches
    #[error("Verification token not found")]
    TokenNotFound,

    /// Verification token is past its expiry
    #[error("Verification token has expired")]
    TokenExpired,

    /// Verification token was already redeemed
    #[error("Verification token has already been used")]
    TokenAlreadyUsed,

    // =========================================================================
    // User / Password Errors
    // =========================================================================
    /// User referenced by a token or session no longer exists
    #[error("User not found")]
    UserNotFound,

    /// Forgot-password target does not exist
    #[error("Email not found")]
    EmailNotFound,

    /// Username or email already registered
    #[error("User already exists")]
    UserAlreadyExists,

    /// New password equals the current one
    #[error("New password cannot be the same as the old password")]
    PasswordUnchanged,

    /// Password and confirmation differ
    #[error("Password confirmation does not match")]
    PasswordMismatch,

    /// Password does not meet requirements
    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Stored password hash could not be parsed
    #[error("Password verification failed")]
    PasswordVerificationFailed,

    /// Password hashing failed
    #[error("Password hashing failed")]
    PasswordHashingFailed,

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not be exposed to clients)
    #[error("Internal error")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::WeakPassword(_)
            | Self::PasswordMismatch
            | Self::PasswordUnchanged
            | Self::InvalidTokenType
            | Self::TokenNotFound
            | Self::TokenExpired
            | Self::TokenAlreadyUsed => 400,

            // 401 Unauthorized
            Self::InvalidCredentials
            | Self::RefreshTokenInvalid
            | Self::InvalidToken
            | Self::AccessTokenExpired => 401,

            // 403 Forbidden
            Self::AccountNotActive => 403,

            // 404 Not Found
            Self::UserNotFound | Self::EmailNotFound => 404,

            // 409 Conflict
            Self::UserAlreadyExists => 409,

            // 423 Locked
            Self::AccountLocked { .. } => 423,

            // 500 Internal Server Error
            Self::PasswordVerificationFailed
            | Self::PasswordHashingFailed
            | Self::Database(_)
            | Self::Config(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Get an error code for the client (safe to expose)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountLocked { .. } => "ACCOUNT_LOCKED",
            Self::AccountNotActive => "ACCOUNT_NOT_ACTIVE",
            Self::RefreshTokenInvalid => "REFRESH_TOKEN_INVALID",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::AccessTokenExpired => "TOKEN_EXPIRED",
            Self::InvalidTokenType => "INVALID_TOKEN_TYPE",
            Self::TokenNotFound => "VERIFICATION_TOKEN_NOT_FOUND",
            Self::TokenExpired => "VERIFICATION_TOKEN_EXPIRED",
            Self::TokenAlreadyUsed => "VERIFICATION_TOKEN_USED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::EmailNotFound => "EMAIL_NOT_FOUND",
            Self::UserAlreadyExists => "USER_ALREADY_EXISTS",
            Self::PasswordUnchanged => "PASSWORD_UNCHANGED",
            Self::PasswordMismatch => "PASSWORD_MISMATCH",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::PasswordVerificationFailed
            | Self::PasswordHashingFailed
            | Self::Database(_)
            | Self::Config(_)
            | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Get safe message for client (doesn't leak internal details)
    pub fn client_message(&self) -> String {
        if self.is_server_error() {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        }
    }

    /// Create an account locked error with retry-after duration
    pub fn account_locked(duration: std::time::Duration) -> Self {
        // Round up so a sub-second remainder never reports 0
        let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
        Self::AccountLocked { retry_after: secs }
    }
}

/// Error response for API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub code: String,
    /// Error message (human-readable)
    pub message: String,
    /// Retry-after in seconds (for lockouts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&AuthError> for ErrorResponse {
    fn from(error: &AuthError) -> Self {
        let retry_after = match error {
            AuthError::AccountLocked { retry_after } => Some(*retry_after),
            _ => None,
        };

        Self {
            code: error.error_code().to_string(),
            message: error.client_message(),
            retry_after,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::AccessTokenExpired,
            _ => Self::InvalidToken,
        }
    }
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        Self::Database(err.to_string())
    }
}
