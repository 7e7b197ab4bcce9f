//! Authentication Flow Tests
//!
//! Drives `AuthService` end to end against the in-memory store: login and
//! lockout, refresh rotation, logout, registration, email verification and
//! password reset.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use kpr_auth::jwt::hash_secret;
use kpr_auth::{
    AuthConfig, AuthError, AuthResult, AuthService, LoginRequest, MemoryStore, NewUser,
    RecordingNotifier, RegisterRequest, RequestMetadata, SentNotification, Session,
    SessionRepository, User, UserId, UserRepository, UserStatus,
};

const PASSWORD: &str = "Correct-Horse7";
const NEW_PASSWORD: &str = "Battery-Staple9";

struct Harness {
    auth: AuthService,
    store: Arc<MemoryStore>,
    notifier: RecordingNotifier,
}

fn test_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.jwt.secret = "integration-test-secret-key-of-32-bytes!".to_string();
    // Use lower values for tests to be fast
    config.password.memory_cost = 4096;
    config.password.time_cost = 1;
    config
}

fn harness_with(config: AuthConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::new();
    let auth = AuthService::with_store(config, store.clone(), Arc::new(notifier.clone()));
    Harness {
        auth,
        store,
        notifier,
    }
}

fn harness() -> Harness {
    harness_with(test_config())
}

fn metadata() -> RequestMetadata {
    RequestMetadata::new("203.0.113.7", "Mozilla/5.0 (X11; Linux x86_64)")
}

fn login_request(identifier: &str, password: &str) -> LoginRequest {
    LoginRequest {
        identifier: identifier.to_string(),
        password: password.to_string(),
    }
}

fn register_request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        phone: None,
        password: PASSWORD.to_string(),
        confirm_password: PASSWORD.to_string(),
    }
}

/// Register and confirm the email so the account can log in
async fn register_active(h: &Harness, username: &str) -> UserId {
    let email = format!("{}@example.com", username);
    let registered = h.auth.register(register_request(username, &email)).await.unwrap();
    let token = h.notifier.last_token().await.unwrap();
    h.auth.verify_email(&token).await.unwrap();
    registered.user_id
}

async fn user(h: &Harness, id: UserId) -> User {
    h.store.find_by_id(id).await.unwrap().unwrap()
}

// =============================================================================
// Login & Lockout
// =============================================================================

mod login {
    use super::*;

    #[tokio::test]
    async fn test_login_persists_one_hashed_session() {
        let h = harness();
        let user_id = register_active(&h, "alice").await;

        let response = h.auth.login(login_request("alice", PASSWORD), metadata()).await.unwrap();
        assert!(!response.tokens.access_token.is_empty());
        assert!(!response.tokens.refresh_token.is_empty());
        assert_eq!(response.user.username, "alice");
        assert!(response.user.email_verified);
        assert!(response.user.last_login_at.is_some());

        let sessions = h.store.sessions_for_user(user_id).await;
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert!(session.is_active());
        assert_eq!(session.id, response.session_id);
        assert_ne!(session.refresh_token_hash, response.tokens.refresh_token);
        assert_eq!(session.refresh_token_hash, hash_secret(&response.tokens.refresh_token));
        assert_eq!(session.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn test_login_by_email_is_case_insensitive() {
        let h = harness();
        register_active(&h, "bob").await;

        let response = h
            .auth
            .login(login_request("BOB@example.com", PASSWORD), metadata())
            .await
            .unwrap();
        assert_eq!(response.user.username, "bob");
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_invalid_credentials() {
        let h = harness();
        let user_id = register_active(&h, "carol").await;

        let err = h
            .auth
            .login(login_request("nobody", PASSWORD), metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(user(&h, user_id).await.failed_login_attempts, 0);
    }

    #[tokio::test]
    async fn test_three_failures_lock_even_correct_password() {
        let h = harness();
        let user_id = register_active(&h, "dave").await;

        for _ in 0..3 {
            let err = h
                .auth
                .login(login_request("dave", "Wrong-Guess42"), metadata())
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        let err = h
            .auth
            .login(login_request("dave", PASSWORD), metadata())
            .await
            .unwrap_err();
        match err {
            AuthError::AccountLocked { retry_after } => {
                assert!(retry_after > 0 && retry_after <= 900);
            }
            other => panic!("expected AccountLocked, got {:?}", other),
        }

        // A locked attempt does not compare the password or count as a failure
        assert_eq!(user(&h, user_id).await.failed_login_attempts, 3);
        assert!(h.store.sessions_for_user(user_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_success_resets_failed_counter() {
        let h = harness();
        let user_id = register_active(&h, "erin").await;

        for _ in 0..2 {
            h.auth
                .login(login_request("erin", "Wrong-Guess42"), metadata())
                .await
                .unwrap_err();
        }
        assert_eq!(user(&h, user_id).await.failed_login_attempts, 2);

        h.auth.login(login_request("erin", PASSWORD), metadata()).await.unwrap();

        let after = user(&h, user_id).await;
        assert_eq!(after.failed_login_attempts, 0);
        assert!(after.locked_until.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_all_counted() {
        let h = harness();
        let user_id = register_active(&h, "frank").await;

        let attempts = (0..3).map(|_| {
            h.auth
                .login(login_request("frank", "Wrong-Guess42"), metadata())
        });
        let results = futures::future::join_all(attempts).await;
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(AuthError::InvalidCredentials))));

        let after = user(&h, user_id).await;
        assert_eq!(after.failed_login_attempts, 3);
        assert!(after.locked_until.is_some());
    }

    #[tokio::test]
    async fn test_pending_account_not_active() {
        let h = harness();
        let registered = h
            .auth
            .register(register_request("grace", "grace@example.com"))
            .await
            .unwrap();

        let err = h
            .auth
            .login(login_request("grace", PASSWORD), metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountNotActive));
        assert_eq!(user(&h, registered.user_id).await.failed_login_attempts, 0);
    }

    #[tokio::test]
    async fn test_unlock_account() {
        let h = harness();
        let user_id = register_active(&h, "heidi").await;

        for _ in 0..3 {
            h.auth
                .login(login_request("heidi", "Wrong-Guess42"), metadata())
                .await
                .unwrap_err();
        }
        h.auth.unlock_account(user_id).await.unwrap();
        h.auth.login(login_request("heidi", PASSWORD), metadata()).await.unwrap();

        assert!(matches!(
            h.auth.unlock_account(9999).await,
            Err(AuthError::UserNotFound)
        ));
    }
}

// =============================================================================
// Refresh, Logout & Profile
// =============================================================================

mod sessions {
    use super::*;

    #[tokio::test]
    async fn test_refresh_rotates_and_old_token_stops_working() {
        let h = harness();
        register_active(&h, "ivan").await;
        let login = h.auth.login(login_request("ivan", PASSWORD), metadata()).await.unwrap();
        let old = login.tokens.refresh_token;

        let refreshed = h.auth.refresh(&old).await.unwrap();
        let new = refreshed.tokens.refresh_token;
        assert_ne!(new, old);
        assert_eq!(refreshed.session_id, login.session_id);

        assert!(h
            .auth
            .sessions
            .find_active_by_refresh_token(&old)
            .await
            .unwrap()
            .is_none());
        assert!(h
            .auth
            .sessions
            .find_active_by_refresh_token(&new)
            .await
            .unwrap()
            .is_some());

        assert!(matches!(h.auth.refresh(&old).await, Err(AuthError::RefreshTokenInvalid)));
        h.auth.refresh(&new).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_exactly_one_wins() {
        let h = harness();
        let user_id = register_active(&h, "ivy").await;
        let login = h.auth.login(login_request("ivy", PASSWORD), metadata()).await.unwrap();
        let token = login.tokens.refresh_token;

        let results = futures::future::join_all((0..2).map(|_| h.auth.refresh(&token))).await;

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(AuthError::RefreshTokenInvalid)))
            .count();
        assert_eq!(winners.len(), 1);
        assert_eq!(rejected, 1);

        // Only the winner's token is live
        let sessions = h.store.sessions_for_user(user_id).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions[0].refresh_token_hash,
            hash_secret(&winners[0].tokens.refresh_token)
        );
        h.auth.refresh(&winners[0].tokens.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let h = harness();
        register_active(&h, "judy").await;
        let login = h.auth.login(login_request("judy", PASSWORD), metadata()).await.unwrap();

        assert!(matches!(
            h.auth.refresh(&login.tokens.access_token).await,
            Err(AuthError::RefreshTokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_logout_unknown_token_is_noop() {
        let h = harness();
        let user_id = register_active(&h, "mallory").await;
        h.auth.login(login_request("mallory", PASSWORD), metadata()).await.unwrap();

        h.auth.logout("R").await.unwrap();

        let sessions = h.store.sessions_for_user(user_id).await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_active());
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let h = harness();
        register_active(&h, "niaj").await;
        let login = h.auth.login(login_request("niaj", PASSWORD), metadata()).await.unwrap();

        h.auth.logout(&login.tokens.refresh_token).await.unwrap();
        // Idempotent
        h.auth.logout(&login.tokens.refresh_token).await.unwrap();

        assert!(matches!(
            h.auth.refresh(&login.tokens.refresh_token).await,
            Err(AuthError::RefreshTokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_logout_all_and_list_sessions() {
        let h = harness();
        let user_id = register_active(&h, "olivia").await;
        let first = h.auth.login(login_request("olivia", PASSWORD), metadata()).await.unwrap();
        h.auth.login(login_request("olivia", PASSWORD), metadata()).await.unwrap();

        assert_eq!(h.auth.list_sessions(user_id).await.unwrap().len(), 2);
        assert_eq!(h.auth.logout_all(&first.tokens.access_token).await.unwrap(), 2);
        assert!(h.auth.list_sessions(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_profile() {
        let h = harness();
        let user_id = register_active(&h, "peggy").await;
        let login = h.auth.login(login_request("peggy", PASSWORD), metadata()).await.unwrap();

        let profile = h.auth.get_profile(&login.tokens.access_token).await.unwrap();
        assert_eq!(profile.id, user_id);
        assert_eq!(profile.status, UserStatus::Active);

        assert!(matches!(
            h.auth.get_profile(&login.tokens.refresh_token).await,
            Err(AuthError::InvalidTokenType)
        ));
        assert!(matches!(
            h.auth.get_profile("garbage").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_retention_is_config_error() {
        let mut config = test_config();
        config.session.retention = Duration::MAX;
        config.verification.expired_retention = Duration::from_secs(u64::MAX / 2);
        let h = harness_with(config);

        assert!(matches!(
            h.auth.cleanup_expired_sessions().await,
            Err(AuthError::Config(_))
        ));
        assert!(matches!(
            h.auth.cleanup_expired_tokens().await,
            Err(AuthError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_deletes_idle_sessions() {
        let h = harness();
        register_active(&h, "rupert").await;
        h.auth.login(login_request("rupert", PASSWORD), metadata()).await.unwrap();

        // Default retention keeps a fresh session
        assert_eq!(h.auth.cleanup_expired_sessions().await.unwrap(), 0);

        let mut config = test_config();
        config.session.retention = Duration::ZERO;
        let sweeper = AuthService::with_store(
            config,
            h.store.clone(),
            Arc::new(RecordingNotifier::new()),
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(sweeper.cleanup_expired_sessions().await.unwrap(), 1);
        assert_eq!(sweeper.cleanup_expired_sessions().await.unwrap(), 0);
    }
}

// =============================================================================
// Registration & Email Verification
// =============================================================================

mod registration {
    use super::*;

    #[tokio::test]
    async fn test_register_creates_pending_user_and_sends_email() {
        let h = harness();
        let response = h
            .auth
            .register(register_request("sybil", "sybil@example.com"))
            .await
            .unwrap();
        assert_eq!(response.status, UserStatus::PendingVerification);

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            SentNotification::Verification { email, .. } if email == "sybil@example.com"
        ));

        let stored = user(&h, response.user_id).await;
        assert!(stored.password_hash.starts_with("$argon2id$"));
        assert!(!stored.is_email_verified());
    }

    #[tokio::test]
    async fn test_register_rejections() {
        let h = harness();
        h.auth
            .register(register_request("trent", "trent@example.com"))
            .await
            .unwrap();

        let mut mismatch = register_request("uma", "uma@example.com");
        mismatch.confirm_password = "Something-Else8".to_string();
        assert!(matches!(h.auth.register(mismatch).await, Err(AuthError::PasswordMismatch)));

        let mut weak = register_request("uma", "uma@example.com");
        weak.password = "short".to_string();
        weak.confirm_password = "short".to_string();
        assert!(matches!(h.auth.register(weak).await, Err(AuthError::WeakPassword(_))));

        assert!(matches!(
            h.auth.register(register_request("trent", "other@example.com")).await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_verify_email_activates_and_is_single_use() {
        let h = harness();
        let registered = h
            .auth
            .register(register_request("victor", "victor@example.com"))
            .await
            .unwrap();
        let token = h.notifier.last_token().await.unwrap();

        let outcome = h.auth.verify_email(&token).await.unwrap();
        assert_eq!(outcome.user_id, registered.user_id);
        assert!(!outcome.already_verified);

        let verified = user(&h, registered.user_id).await;
        assert_eq!(verified.status, UserStatus::Active);
        let verified_at = verified.email_verified_at.unwrap();

        assert!(matches!(
            h.auth.verify_email(&token).await,
            Err(AuthError::TokenAlreadyUsed)
        ));

        // A fresh token for an already verified user succeeds without re-stamping
        let again = h
            .auth
            .generate_email_verification_token(registered.user_id)
            .await
            .unwrap();
        assert!(h.auth.verify_email(&again).await.unwrap().already_verified);
        assert_eq!(
            user(&h, registered.user_id).await.email_verified_at,
            Some(verified_at)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeem_exactly_one_wins() {
        let h = harness();
        h.auth
            .register(register_request("walter", "walter@example.com"))
            .await
            .unwrap();
        let token = h.notifier.last_token().await.unwrap();

        let results =
            futures::future::join_all((0..2).map(|_| h.auth.verify_email(&token))).await;

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let already_used = results
            .iter()
            .filter(|r| matches!(r, Err(AuthError::TokenAlreadyUsed)))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(already_used, 1);
    }

    #[tokio::test]
    async fn test_reset_token_cannot_verify_email() {
        let h = harness();
        register_active(&h, "xavier").await;
        h.auth.forgot_password("xavier@example.com").await.unwrap();
        let reset_token = h.notifier.last_token().await.unwrap();

        assert!(matches!(
            h.auth.verify_email(&reset_token).await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_unknown_verification_token() {
        let h = harness();
        assert!(matches!(
            h.auth.verify_email("not-a-real-token").await,
            Err(AuthError::TokenNotFound)
        ));
        assert!(matches!(
            h.auth.generate_email_verification_token(42).await,
            Err(AuthError::UserNotFound)
        ));
    }
}

// =============================================================================
// Password Reset
// =============================================================================

mod password_reset {
    use super::*;

    #[tokio::test]
    async fn test_forgot_password_missing_email() {
        let h = harness();
        register_active(&h, "yvonne").await;
        let tokens_before = h.store.token_count().await;
        let sent_before = h.notifier.sent().await.len();

        assert!(matches!(
            h.auth.forgot_password("missing@x.com").await,
            Err(AuthError::EmailNotFound)
        ));
        assert_eq!(h.store.token_count().await, tokens_before);
        assert_eq!(h.notifier.sent().await.len(), sent_before);
    }

    #[tokio::test]
    async fn test_forgot_password_sends_ttl() {
        let h = harness();
        register_active(&h, "zoe").await;
        h.auth.forgot_password("zoe@example.com").await.unwrap();

        let sent = h.notifier.sent().await;
        assert!(matches!(
            sent.last(),
            Some(SentNotification::PasswordReset { ttl_minutes: 15, .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_password_changes_password_and_revokes_sessions() {
        let h = harness();
        let user_id = register_active(&h, "amy").await;
        let login = h.auth.login(login_request("amy", PASSWORD), metadata()).await.unwrap();

        h.auth.forgot_password("amy@example.com").await.unwrap();
        let token = h.notifier.last_token().await.unwrap();
        h.auth.reset_password(&token, NEW_PASSWORD).await.unwrap();

        assert!(h.auth.list_sessions(user_id).await.unwrap().is_empty());
        assert!(matches!(
            h.auth.refresh(&login.tokens.refresh_token).await,
            Err(AuthError::RefreshTokenInvalid)
        ));
        assert!(matches!(
            h.auth.login(login_request("amy", PASSWORD), metadata()).await,
            Err(AuthError::InvalidCredentials)
        ));
        h.auth.login(login_request("amy", NEW_PASSWORD), metadata()).await.unwrap();

        assert!(matches!(
            h.auth.reset_password(&token, "Third-Choice5").await,
            Err(AuthError::TokenAlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn test_reset_to_same_password_mutates_nothing() {
        let h = harness();
        let user_id = register_active(&h, "bert").await;
        h.auth.login(login_request("bert", PASSWORD), metadata()).await.unwrap();
        h.auth.forgot_password("bert@example.com").await.unwrap();
        let token = h.notifier.last_token().await.unwrap();
        let before = user(&h, user_id).await;

        assert!(matches!(
            h.auth.reset_password(&token, PASSWORD).await,
            Err(AuthError::PasswordUnchanged)
        ));

        let after = user(&h, user_id).await;
        assert_eq!(after.password_hash, before.password_hash);
        assert_eq!(h.auth.list_sessions(user_id).await.unwrap().len(), 1);
        assert!(h
            .store
            .tokens_for_user(user_id)
            .await
            .iter()
            .filter(|t| t.token_hash == hash_secret(&token))
            .all(|t| t.used_at.is_none()));

        // The token is still good for a real change
        h.auth.reset_password(&token, NEW_PASSWORD).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_reset_token() {
        let mut config = test_config();
        config.verification.password_reset_ttl_minutes = 0;
        let h = harness_with(config);
        register_active(&h, "cathy").await;

        h.auth.forgot_password("cathy@example.com").await.unwrap();
        let token = h.notifier.last_token().await.unwrap();

        assert!(matches!(
            h.auth.reset_password(&token, NEW_PASSWORD).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_lockout() {
        let h = harness();
        register_active(&h, "doug").await;
        for _ in 0..3 {
            h.auth
                .login(login_request("doug", "Wrong-Guess42"), metadata())
                .await
                .unwrap_err();
        }

        h.auth.forgot_password("doug@example.com").await.unwrap();
        let token = h.notifier.last_token().await.unwrap();
        h.auth.reset_password(&token, NEW_PASSWORD).await.unwrap();

        h.auth.login(login_request("doug", NEW_PASSWORD), metadata()).await.unwrap();
    }

    #[tokio::test]
    async fn test_weak_new_password_rejected() {
        let h = harness();
        register_active(&h, "edna").await;
        h.auth.forgot_password("edna@example.com").await.unwrap();
        let token = h.notifier.last_token().await.unwrap();

        assert!(matches!(
            h.auth.reset_password(&token, "weak").await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_request() {
        let store = Arc::new(MemoryStore::new());
        let notifier = RecordingNotifier::failing();
        let auth = AuthService::with_store(test_config(), store.clone(), Arc::new(notifier.clone()));

        auth.register(register_request("fred", "fred@example.com")).await.unwrap();
        auth.forgot_password("fred@example.com").await.unwrap();
        assert_eq!(notifier.sent().await.len(), 2);
    }
}

// =============================================================================
// Storage Failures
// =============================================================================

mod storage_failures {
    use super::*;

    /// User store whose every call fails
    struct BrokenUsers;

    #[async_trait]
    impl UserRepository for BrokenUsers {
        async fn create(&self, _user: NewUser) -> AuthResult<User> {
            Err(AuthError::Database("connection refused".to_string()))
        }
        async fn find_by_id(&self, _id: UserId) -> AuthResult<Option<User>> {
            Err(AuthError::Database("connection refused".to_string()))
        }
        async fn find_by_username(&self, _username: &str) -> AuthResult<Option<User>> {
            Err(AuthError::Database("connection refused".to_string()))
        }
        async fn find_by_email(&self, _email: &str) -> AuthResult<Option<User>> {
            Err(AuthError::Database("connection refused".to_string()))
        }
        async fn find_by_identifier(&self, _identifier: &str) -> AuthResult<Option<User>> {
            Err(AuthError::Database("connection refused".to_string()))
        }
        async fn record_failed_login(
            &self,
            _id: UserId,
            _threshold: u32,
            _lock_until: DateTime<Utc>,
        ) -> AuthResult<Option<User>> {
            Err(AuthError::Database("connection refused".to_string()))
        }
        async fn reset_failed_logins(&self, _id: UserId) -> AuthResult<()> {
            Err(AuthError::Database("connection refused".to_string()))
        }
        async fn touch_last_login(&self, _id: UserId, _at: DateTime<Utc>) -> AuthResult<()> {
            Err(AuthError::Database("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_invalid_credentials() {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthService::new(
            test_config(),
            Arc::new(BrokenUsers),
            store.clone() as Arc<dyn SessionRepository>,
            store,
            Arc::new(RecordingNotifier::new()),
        );

        let err = auth
            .login(login_request("alice", PASSWORD), metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Database(_)));
        assert_eq!(err.status_code(), 500);

        assert!(matches!(
            auth.forgot_password("alice@example.com").await,
            Err(AuthError::Database(_))
        ));
    }

    /// Session store whose bulk revocation always fails
    struct NoBulkRevoke {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl SessionRepository for NoBulkRevoke {
        async fn create(&self, session: &Session) -> AuthResult<()> {
            SessionRepository::create(self.inner.as_ref(), session).await
        }
        async fn find_active_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>> {
            self.inner.find_active_by_token_hash(token_hash).await
        }
        async fn rotate(
            &self,
            id: Uuid,
            old_hash: &str,
            new_hash: &str,
            now: DateTime<Utc>,
        ) -> AuthResult<bool> {
            self.inner.rotate(id, old_hash, new_hash, now).await
        }
        async fn revoke(&self, id: Uuid) -> AuthResult<bool> {
            self.inner.revoke(id).await
        }
        async fn revoke_all_for_user(&self, _user_id: UserId) -> AuthResult<u64> {
            Err(AuthError::Database("connection reset".to_string()))
        }
        async fn list_active(&self, user_id: UserId) -> AuthResult<Vec<Session>> {
            self.inner.list_active(user_id).await
        }
        async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
            self.inner.delete_inactive_before(cutoff).await
        }
    }

    #[tokio::test]
    async fn test_reset_revokes_sessions_with_the_password_change() {
        let store = Arc::new(MemoryStore::new());
        let notifier = RecordingNotifier::new();
        let auth = AuthService::new(
            test_config(),
            store.clone(),
            Arc::new(NoBulkRevoke {
                inner: store.clone(),
            }),
            store.clone(),
            Arc::new(notifier.clone()),
        );

        let registered = auth
            .register(register_request("gina", "gina@example.com"))
            .await
            .unwrap();
        auth.verify_email(&notifier.last_token().await.unwrap())
            .await
            .unwrap();
        let login = auth.login(login_request("gina", PASSWORD), metadata()).await.unwrap();

        auth.forgot_password("gina@example.com").await.unwrap();
        let token = notifier.last_token().await.unwrap();
        auth.reset_password(&token, NEW_PASSWORD).await.unwrap();

        assert!(matches!(
            auth.refresh(&login.tokens.refresh_token).await,
            Err(AuthError::RefreshTokenInvalid)
        ));
        assert!(auth.list_sessions(registered.user_id).await.unwrap().is_empty());
        auth.login(login_request("gina", NEW_PASSWORD), metadata()).await.unwrap();
    }
}
