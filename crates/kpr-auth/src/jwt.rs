//! JWT Token Service
//!
//! Stateless codec for the bearer tokens issued at login and refresh:
//! - Access tokens (short-lived) for API authentication
//! - Refresh tokens (long-lived), exchanged for a new pair on rotation
//! - SHA-256 hashing of raw secrets so storage never holds usable tokens
//!
//! Both token kinds share one HS256 key; the `token_type` claim keeps them
//! from being used interchangeably.

use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::types::{TokenClaims, TokenPair, TokenType, UserId};

/// Length of generated raw secrets in bytes
const SECRET_LENGTH: usize = 32;

/// JWT service for token management
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a short-lived access token
    pub fn issue_access_token(&self, username: &str, user_id: UserId, role: &str) -> AuthResult<String> {
        self.issue(username, user_id, role, TokenType::Access)
            .map(|(token, _)| token)
    }

    /// Issue a long-lived refresh token
    pub fn issue_refresh_token(&self, username: &str, user_id: UserId, role: &str) -> AuthResult<String> {
        self.issue(username, user_id, role, TokenType::Refresh)
            .map(|(token, _)| token)
    }

    /// Issue an access + refresh pair
    pub fn issue_token_pair(&self, username: &str, user_id: UserId, role: &str) -> AuthResult<TokenPair> {
        let (access_token, access_exp) = self.issue(username, user_id, role, TokenType::Access)?;
        let (refresh_token, refresh_exp) = self.issue(username, user_id, role, TokenType::Refresh)?;

        Ok(TokenPair::new(access_token, refresh_token, access_exp, refresh_exp))
    }

    /// Whether the token has a valid signature, structure, issuer, audience and
    /// has not expired. Fails closed.
    pub fn validate(&self, token: &str) -> bool {
        self.decode_token(token).is_ok()
    }

    /// Validate an access token and return claims
    pub fn validate_access_token(&self, token: &str) -> AuthResult<TokenClaims> {
        let claims = self.decode_token(token)?;

        if claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Validate a refresh token and return claims
    pub fn validate_refresh_token(&self, token: &str) -> AuthResult<TokenClaims> {
        let claims = self.decode_token(token)?;

        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Username (`sub`) of a token. Call [`validate`](Self::validate) first.
    pub fn extract_username(&self, token: &str) -> AuthResult<String> {
        self.decode_token(token).map(|claims| claims.sub)
    }

    /// User ID of a token. Call [`validate`](Self::validate) first.
    pub fn extract_user_id(&self, token: &str) -> AuthResult<UserId> {
        self.decode_token(token).map(|claims| claims.uid)
    }

    /// Role of a token. Call [`validate`](Self::validate) first.
    pub fn extract_role(&self, token: &str) -> AuthResult<String> {
        self.decode_token(token).map(|claims| claims.role)
    }

    fn issue(
        &self,
        username: &str,
        user_id: UserId,
        role: &str,
        token_type: TokenType,
    ) -> AuthResult<(String, i64)> {
        let lifetime = match token_type {
            TokenType::Access => self.config.access_token_lifetime,
            TokenType::Refresh => self.config.refresh_token_lifetime,
        };

        let now = Utc::now();
        let exp = Duration::from_std(lifetime)
            .ok()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| AuthError::Config(format!("token lifetime out of range: {:?}", lifetime)))?;

        let claims = TokenClaims {
            sub: username.to_string(),
            uid: user_id,
            role: role.to_string(),
            token_type,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to encode {:?} token: {}", token_type, e)))?;

        Ok((token, exp.timestamp()))
    }

    /// Decode and validate a token (shared logic)
    fn decode_token(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}

/// One-way hash of a raw secret for storage (SHA-256, lowercase hex)
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Generate a URL-safe random secret from the OS RNG
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
