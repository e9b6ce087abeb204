//! In-process credential store.
//!
//! Holds the three tables behind one `RwLock`. Used by the test suites and
//! by the server's `--in-memory` development mode.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::AuthError;
use super::store::CredentialStore;
use crate::models::auth::{
    Action, NewSession, NewUser, ProfileUpdate, Role, RolePermission, Session, User, UserUpdate,
    UserWithPassword,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<i64, UserWithPassword>,
    sessions: Vec<Session>,
    permissions: BTreeSet<(Role, String, Action)>,
    next_user_id: i64,
    next_session_id: i64,
}

impl Tables {
    /// Whether `username` or `email` is held by a user other than `except`.
    fn identity_taken(&self, username: Option<&str>, email: Option<&str>, except: Option<i64>) -> bool {
        self.users.values().any(|u| {
            Some(u.user.user_id) != except
                && (username == Some(u.user.username.as_str())
                    || email == Some(u.user.email.as_str()))
        })
    }
}

/// Credential store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every session for `user_id`, oldest first.
    pub async fn sessions_for(&self, user_id: i64) -> Vec<Session> {
        let tables = self.tables.read().await;
        tables
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_active_user(
        &self,
        identifier: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.user.is_active && (u.user.username == identifier || u.user.email == identifier)
            })
            .cloned())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserWithPassword>, AuthError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().map(|u| u.user.clone()).collect();
        users.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.user_id.cmp(&a.user_id))
        });
        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, AuthError> {
        let mut tables = self.tables.write().await;
        if tables.identity_taken(Some(&user.username), Some(&user.email), None) {
            return Err(AuthError::DuplicateIdentity);
        }
        tables.next_user_id += 1;
        let record = User {
            user_id: tables.next_user_id,
            username: user.username,
            email: user.email,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        tables.users.insert(
            record.user_id,
            UserWithPassword {
                user: record.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(record)
    }

    async fn update_user(
        &self,
        user_id: i64,
        update: UserUpdate,
    ) -> Result<Option<User>, AuthError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Ok(None);
        }
        if tables.identity_taken(update.username.as_deref(), update.email.as_deref(), Some(user_id)) {
            return Err(AuthError::DuplicateIdentity);
        }
        let Some(entry) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };
        let user = &mut entry.user;
        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(first_name) = update.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = update.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }
        Ok(Some(user.clone()))
    }

    async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<bool, AuthError> {
        let mut tables = self.tables.write().await;
        if tables.identity_taken(None, update.email.as_deref(), Some(user_id)) {
            return Err(AuthError::DuplicateIdentity);
        }
        let Some(entry) = tables.users.get_mut(&user_id) else {
            return Ok(false);
        };
        if let Some(first_name) = update.first_name {
            entry.user.first_name = Some(first_name);
        }
        if let Some(last_name) = update.last_name {
            entry.user.last_name = Some(last_name);
        }
        if let Some(email) = update.email {
            entry.user.email = email;
        }
        Ok(true)
    }

    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user_id) {
            Some(entry) => {
                entry.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, AuthError> {
        let mut tables = self.tables.write().await;
        let removed = tables.users.remove(&user_id).is_some();
        if removed {
            tables.sessions.retain(|s| s.user_id != user_id);
        }
        Ok(removed)
    }

    async fn record_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AuthError> {
        let mut tables = self.tables.write().await;
        if let Some(entry) = tables.users.get_mut(&user_id) {
            entry.user.last_login = Some(at);
        }
        Ok(())
    }

    async fn insert_session(&self, session: NewSession) -> Result<Session, AuthError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&session.user_id) {
            return Err(AuthError::Store(format!(
                "session references unknown user {}",
                session.user_id
            )));
        }
        tables.next_session_id += 1;
        let record = Session {
            session_id: tables.next_session_id,
            user_id: session.user_id,
            token_hash: session.token_hash,
            expires_at: session.expires_at,
            created_at: Utc::now(),
            is_active: true,
        };
        tables.sessions.push(record.clone());
        Ok(record)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn revoke_sessions(&self, user_id: i64) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for session in tables
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.is_active)
        {
            session.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn role_permissions(&self, role: Role) -> Result<Vec<RolePermission>, AuthError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<RolePermission> = tables
            .permissions
            .iter()
            .filter(|(r, _, _)| *r == role)
            .map(|(r, resource, action)| RolePermission::new(*r, resource.clone(), *action))
            .collect();
        // Same order as the SQL store's `ORDER BY resource, action`.
        rows.sort_by(|a, b| {
            (&a.resource, a.action.as_str()).cmp(&(&b.resource, b.action.as_str()))
        });
        Ok(rows)
    }

    async fn seed_role_permissions(&self, rows: &[RolePermission]) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let mut inserted = 0;
        for row in rows {
            if tables
                .permissions
                .insert((row.role, row.resource.clone(), row.action))
            {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::SalesRep,
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let store = MemoryCredentialStore::new();
        store.insert_user(new_user("bob", "bob@x.com")).await.unwrap();
        let by_name = store.insert_user(new_user("bob", "other@x.com")).await;
        assert!(matches!(by_name, Err(AuthError::DuplicateIdentity)));
        let by_email = store.insert_user(new_user("robert", "bob@x.com")).await;
        assert!(matches!(by_email, Err(AuthError::DuplicateIdentity)));
    }

    #[tokio::test]
    async fn inactive_users_are_not_found_for_login() {
        let store = MemoryCredentialStore::new();
        let bob = store.insert_user(new_user("bob", "bob@x.com")).await.unwrap();
        assert!(store.find_active_user("bob@x.com").await.unwrap().is_some());
        store
            .update_user(
                bob.user_id,
                UserUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(store.find_active_user("bob").await.unwrap().is_none());
        assert!(store.get_user(bob.user_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_to_own_email_is_not_a_duplicate() {
        let store = MemoryCredentialStore::new();
        let bob = store.insert_user(new_user("bob", "bob@x.com")).await.unwrap();
        let updated = store
            .update_profile(
                bob.user_id,
                ProfileUpdate {
                    email: Some("bob@x.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated);
    }

    #[tokio::test]
    async fn delete_cascades_sessions() {
        let store = MemoryCredentialStore::new();
        let bob = store.insert_user(new_user("bob", "bob@x.com")).await.unwrap();
        store
            .insert_session(NewSession {
                user_id: bob.user_id,
                token_hash: "fp".into(),
                expires_at: Utc::now() + Duration::hours(24),
            })
            .await
            .unwrap();
        assert!(store.delete_user(bob.user_id).await.unwrap());
        assert!(store.find_session("fp").await.unwrap().is_none());
        assert!(!store.delete_user(bob.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = MemoryCredentialStore::new();
        let rows = [
            RolePermission::new(Role::Manager, "tasks", Action::Read),
            RolePermission::new(Role::Manager, "tasks", Action::Create),
        ];
        assert_eq!(store.seed_role_permissions(&rows).await.unwrap(), 2);
        assert_eq!(store.seed_role_permissions(&rows).await.unwrap(), 0);
        let listed = store.role_permissions(Role::Manager).await.unwrap();
        assert_eq!(listed[0].action, Action::Create);
        assert_eq!(listed[1].action, Action::Read);
    }

    #[tokio::test]
    async fn permissions_list_by_resource_then_action_name() {
        let store = MemoryCredentialStore::new();
        store
            .seed_role_permissions(&crate::auth::seed::default_role_permissions())
            .await
            .unwrap();
        let actions: Vec<&str> = store
            .role_permissions(Role::Admin)
            .await
            .unwrap()
            .iter()
            .filter(|p| p.resource == "companies")
            .map(|p| p.action.as_str())
            .collect();
        assert_eq!(actions, ["create", "delete", "export", "read", "update"]);
    }
}
