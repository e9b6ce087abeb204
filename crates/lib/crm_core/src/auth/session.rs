//! Session manager: login, logout and account creation.
//!
//! The only writer of session rows. Login issues a bearer token and records
//! its SHA-256 fingerprint; logout revokes every session of the user.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::AuthError;
use super::jwt::{TokenCodec, fingerprint};
use super::password::PasswordHasher;
use super::store::CredentialStore;
use crate::models::auth::{Identity, NewSession, NewUser, Role, User};

/// Fields supplied when creating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct UserFields {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Successful login: the raw token (returned once, never stored) and the
/// public user projection.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: Identity,
}

/// Orchestrates credential checks, token issuance and session bookkeeping.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    codec: Arc<TokenCodec>,
    /// Verified against on unknown identifiers so the miss costs as much
    /// bcrypt work as a wrong password.
    dummy_hash: OnceLock<String>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher, codec: Arc<TokenCodec>) -> Self {
        Self {
            store,
            hasher,
            codec,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Authenticate with username-or-email + password.
    ///
    /// Unknown identifier, inactive account and wrong password all yield
    /// [`AuthError::InvalidCredentials`].
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let Some(record) = self.store.find_active_user(identifier).await? else {
            let dummy = self
                .dummy_hash
                .get_or_init(|| self.hasher.hash("not-a-real-password").unwrap_or_default());
            self.hasher.verify(password, dummy);
            warn!(identifier, "login failed: no active user");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &record.password_hash) {
            warn!(user_id = record.user.user_id, "login failed: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        if let Err(e) = self.store.record_login(record.user.user_id, now).await {
            warn!(user_id = record.user.user_id, error = %e, "failed to record last login");
        }

        let identity = Identity::from(&record.user);
        let token = self.codec.issue(&identity)?;

        // The gate checks sessions on every request, so a token without a
        // session row is useless; fail the login instead of returning it.
        self.store
            .insert_session(NewSession {
                user_id: identity.user_id,
                token_hash: fingerprint(&token),
                expires_at: now + self.codec.ttl(),
            })
            .await?;

        info!(user_id = identity.user_id, role = %identity.role, "login succeeded");
        Ok(LoginOutcome {
            token,
            user: identity,
        })
    }

    /// Revoke every session of `user_id`. Idempotent.
    pub async fn logout(&self, user_id: i64) -> Result<(), AuthError> {
        let revoked = self.store.revoke_sessions(user_id).await?;
        info!(user_id, revoked, "sessions revoked");
        Ok(())
    }

    /// Create a user, hashing the supplied password.
    pub async fn register(&self, fields: UserFields) -> Result<User, AuthError> {
        if fields.username.trim().is_empty()
            || fields.email.trim().is_empty()
            || fields.password.is_empty()
        {
            return Err(AuthError::Validation(
                "Username, email, password, and role are required".into(),
            ));
        }
        let password_hash = self.hasher.hash(&fields.password)?;
        let user = self
            .store
            .insert_user(NewUser {
                username: fields.username,
                email: fields.email,
                password_hash,
                role: fields.role,
                first_name: fields.first_name,
                last_name: fields.last_name,
            })
            .await?;
        info!(user_id = user.user_id, role = %user.role, "user created");
        Ok(user)
    }

    /// Verify `current` against the stored hash, then store a hash of `new`.
    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        if new.is_empty() {
            return Err(AuthError::Validation("New password must not be empty".into()));
        }
        let record = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        if !self.hasher.verify(current, &record.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        let hash = self.hasher.hash(new)?;
        self.store.update_password_hash(user_id, &hash).await?;
        info!(user_id, "password changed");
        Ok(())
    }
}
