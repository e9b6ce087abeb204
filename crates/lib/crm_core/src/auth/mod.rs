//! Authentication and authorization logic.
//!
//! Provides password hashing, JWT management, session bookkeeping, the
//! role/permission engine and the request gate, all on top of the
//! [`store::CredentialStore`] capability.

pub mod authz;
pub mod gate;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod seed;
pub mod session;
pub mod store;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identifier, inactive user or wrong password. Deliberately
    /// indistinguishable to the caller.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Username or email already exists")]
    DuplicateIdentity,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::DuplicateIdentity,
            _ => AuthError::Store(e.to_string()),
        }
    }
}
