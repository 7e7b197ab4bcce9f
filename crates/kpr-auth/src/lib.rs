//! KPR Authentication Layer
//!
//! Authentication and session lifecycle for the KPR platform:
//!
//! - **JWT Authentication**: HS256 access tokens + refresh tokens with rotation
//! - **Session Management**: refresh-token backed sessions, stored as hashes
//! - **Password Security**: Argon2id hashing (OWASP recommended)
//! - **Lockout**: per-user failed-login counter with a timed lock
//! - **Verification Tokens**: single-use email verification and password reset
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        AuthService                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │   JwtService   PasswordService   LockoutPolicy   Notifier   │
//! │                                       │                     │
//! │          SessionService      VerificationService            │
//! │                │                      │                     │
//! │                ▼                      ▼                     │
//! │   SessionRepository  UserRepository  VerificationTokenRepo  │
//! │                │            │             │                 │
//! │                └────────────┼─────────────┘                 │
//! │                     PgStore / MemoryStore                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage never holds a usable secret: refresh tokens and verification
//! tokens are stored as SHA-256 digests, passwords as Argon2id PHC strings.

pub mod config;
pub mod error;
pub mod jwt;
pub mod lockout;
pub mod notify;
pub mod password;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
pub mod verification;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, ErrorResponse};
pub use jwt::JwtService;
pub use lockout::LockoutPolicy;
pub use notify::{LogNotifier, Notifier, RecordingNotifier, SentNotification};
pub use password::PasswordService;
pub use service::AuthService;
pub use session::SessionService;
pub use store::{MemoryStore, PgStore, SessionRepository, UserRepository, VerificationTokenRepository};
pub use types::*;
pub use verification::VerificationService;
