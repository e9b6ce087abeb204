//! Credential store capability.
//!
//! The session manager, authorization engine and request gate only talk to
//! storage through this trait. [`super::queries::PgCredentialStore`] backs it
//! with PostgreSQL; [`super::memory::MemoryCredentialStore`] keeps everything
//! in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use crate::models::auth::{
    NewSession, NewUser, ProfileUpdate, Role, RolePermission, Session, User, UserUpdate,
    UserWithPassword,
};

/// Storage for users, sessions and role permissions.
///
/// Every method is a single atomic statement against the store. Unique
/// username/email violations surface as [`AuthError::DuplicateIdentity`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find an active user whose username or email equals `identifier`.
    async fn find_active_user(&self, identifier: &str)
    -> Result<Option<UserWithPassword>, AuthError>;

    /// Fetch a user (active or not) by id.
    async fn get_user(&self, user_id: i64) -> Result<Option<UserWithPassword>, AuthError>;

    /// All users, newest first.
    async fn list_users(&self) -> Result<Vec<User>, AuthError>;

    async fn insert_user(&self, user: NewUser) -> Result<User, AuthError>;

    /// Apply an admin update. Returns the updated user, `None` if absent.
    async fn update_user(&self, user_id: i64, update: UserUpdate)
    -> Result<Option<User>, AuthError>;

    /// Apply a self-service profile update. Returns `false` if absent.
    async fn update_profile(&self, user_id: i64, update: ProfileUpdate)
    -> Result<bool, AuthError>;

    /// Replace the stored password hash. Returns `false` if absent.
    async fn update_password_hash(&self, user_id: i64, password_hash: &str)
    -> Result<bool, AuthError>;

    /// Hard-delete a user and, by cascade, their sessions.
    async fn delete_user(&self, user_id: i64) -> Result<bool, AuthError>;

    async fn record_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AuthError>;

    async fn insert_session(&self, session: NewSession) -> Result<Session, AuthError>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, AuthError>;

    /// Mark every session of `user_id` inactive. Returns how many changed.
    async fn revoke_sessions(&self, user_id: i64) -> Result<u64, AuthError>;

    /// Permission rows for `role`, sorted by resource then action name.
    async fn role_permissions(&self, role: Role) -> Result<Vec<RolePermission>, AuthError>;

    /// Insert permission rows, ignoring ones already present. Returns how
    /// many were new.
    async fn seed_role_permissions(&self, rows: &[RolePermission]) -> Result<u64, AuthError>;
}
