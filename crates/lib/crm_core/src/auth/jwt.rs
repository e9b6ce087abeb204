//! JWT token generation and verification.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

use super::AuthError;
use crate::models::auth::{Identity, TokenClaims};

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Development-only fallback secret. Rejected in production.
pub const DEV_DEFAULT_SECRET: &str = "your-super-secret-jwt-key-change-in-production";

/// Shortest secret accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Signs and verifies time-limited bearer tokens (HS256).
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Default lifetime for issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `identity` with the codec's default lifetime.
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_with_ttl(identity, self.ttl)
    }

    /// Issue a token for `identity` expiring `ttl` from now.
    pub fn issue_with_ttl(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            identity: identity.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: random_alphanumeric(24),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature and expiry, returning the claims on success.
    ///
    /// Expired tokens yield [`AuthError::TokenExpired`]; every other failure
    /// yields [`AuthError::TokenInvalid`].
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })
    }
}

fn random_alphanumeric(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// SHA-256 fingerprint of an issued token, as stored on its session row.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Signing secret misconfiguration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("JWT_SECRET must be set in production")]
    Missing,

    #[error("JWT_SECRET must not be the development default in production")]
    DevDefault,

    #[error("JWT_SECRET must be at least {MIN_PRODUCTION_SECRET_LEN} bytes in production")]
    TooShort,
}

/// Resolve the signing secret from the configured value.
///
/// Production refuses a missing, default or short secret. Development falls
/// back to a random per-process secret, so tokens do not survive a restart.
pub fn resolve_jwt_secret(configured: Option<&str>, production: bool) -> Result<String, SecretError> {
    let configured = configured.map(str::trim).filter(|s| !s.is_empty());
    match (configured, production) {
        (None, true) => Err(SecretError::Missing),
        (Some(DEV_DEFAULT_SECRET), true) => Err(SecretError::DevDefault),
        (Some(s), true) if s.len() < MIN_PRODUCTION_SECRET_LEN => Err(SecretError::TooShort),
        (Some(s), _) => Ok(s.to_string()),
        (None, false) => {
            warn!("JWT_SECRET not set, using a random development secret");
            Ok(random_alphanumeric(64))
        }
    }
}
