//! Authorization engine: role gates, permission lookups and data filters.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::AuthError;
use super::seed::FEEDBACK_RESOURCE;
use super::store::CredentialStore;
use crate::models::auth::{Action, Identity, Role, RolePermission};

/// Declarative visibility restriction handed to the data layer, which is
/// responsible for applying it to its queries.
///
/// Serializes to `{}` when unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilter {
    /// Only records explicitly assigned to `user_id`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub assigned_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// No mutations.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl DataFilter {
    pub fn is_unrestricted(&self) -> bool {
        *self == DataFilter::default()
    }
}

type PermissionSet = HashSet<(String, Action)>;

#[derive(Default)]
struct PermissionCache {
    /// Bumped by every invalidation. A load that started under an older
    /// generation must not be cached.
    generation: u64,
    sets: HashMap<Role, Arc<PermissionSet>>,
}

/// Evaluates `(identity, resource, action)` against the role/permission table.
///
/// Permission rows are cached per role after the first lookup; call
/// [`AuthorizationEngine::invalidate`] after the table changes.
pub struct AuthorizationEngine {
    store: Arc<dyn CredentialStore>,
    cache: RwLock<PermissionCache>,
}

impl AuthorizationEngine {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(PermissionCache::default()),
        }
    }

    /// Coarse gate: the identity's role is one of `allowed`.
    pub fn authorize_role(identity: &Identity, allowed: &[Role]) -> bool {
        allowed.contains(&identity.role)
    }

    /// Fine gate: a `(role, resource, action)` row exists.
    pub async fn authorize_permission(
        &self,
        identity: &Identity,
        resource: &str,
        action: Action,
    ) -> Result<bool, AuthError> {
        let permissions = self.permissions_for(identity.role).await?;
        Ok(permissions.contains(&(resource.to_string(), action)))
    }

    /// Permission rows for `role`, read straight from the store.
    pub async fn role_permissions(&self, role: Role) -> Result<Vec<RolePermission>, AuthError> {
        self.store.role_permissions(role).await
    }

    /// Drop every cached permission set.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        cache.generation += 1;
        cache.sets.clear();
        debug!(generation = cache.generation, "permission cache invalidated");
    }

    async fn permissions_for(&self, role: Role) -> Result<Arc<PermissionSet>, AuthError> {
        let generation = {
            let cache = self.cache.read().await;
            if let Some(set) = cache.sets.get(&role) {
                return Ok(set.clone());
            }
            cache.generation
        };
        let rows = self.store.role_permissions(role).await?;
        let set: Arc<PermissionSet> = Arc::new(
            rows.into_iter()
                .map(|row| (row.resource, row.action))
                .collect(),
        );
        debug!(role = %role, grants = set.len(), "permission set loaded");
        self.cache_if_current(role, set.clone(), generation).await;
        Ok(set)
    }

    /// Cache `set` unless an invalidation happened since `generation` was read.
    async fn cache_if_current(&self, role: Role, set: Arc<PermissionSet>, generation: u64) {
        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.sets.insert(role, set);
        } else {
            debug!(role = %role, "permission set went stale while loading, not cached");
        }
    }

    /// Visibility filter for a request by `identity` against `resource`.
    pub fn data_filter_for(identity: &Identity, resource: Option<&str>) -> DataFilter {
        match identity.role {
            Role::Admin | Role::Manager => DataFilter::default(),
            Role::SalesRep => DataFilter {
                assigned_only: true,
                user_id: Some(identity.user_id),
                ..Default::default()
            },
            Role::Developer if resource == Some(FEEDBACK_RESOURCE) => DataFilter::default(),
            Role::Developer => DataFilter {
                read_only: true,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::MemoryCredentialStore;
    use crate::auth::seed::default_role_permissions;

    fn identity(user_id: i64, role: Role) -> Identity {
        Identity {
            user_id,
            username: format!("user{user_id}"),
            email: format!("user{user_id}@crm.com"),
            role,
            first_name: None,
            last_name: None,
        }
    }

    async fn seeded() -> (Arc<MemoryCredentialStore>, AuthorizationEngine) {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .seed_role_permissions(&default_role_permissions())
            .await
            .unwrap();
        let engine = AuthorizationEngine::new(store.clone());
        (store, engine)
    }

    #[tokio::test]
    async fn permission_holds_iff_triple_was_seeded() {
        let (_store, engine) = seeded().await;
        let seeded: HashSet<RolePermission> = default_role_permissions().into_iter().collect();
        let resources = [
            "users",
            "companies",
            "contacts",
            "feedbacks",
            "projects",
            "tasks",
            "team_members",
            "analytics",
            "settings",
            "invoices",
        ];
        for role in Role::ALL {
            let who = identity(1, role);
            for resource in resources {
                for action in Action::ALL {
                    let expected = seeded.contains(&RolePermission::new(role, resource, action));
                    let actual = engine
                        .authorize_permission(&who, resource, action)
                        .await
                        .unwrap();
                    assert_eq!(actual, expected, "{role} {resource} {action}");
                }
            }
        }
    }

    #[tokio::test]
    async fn cache_serves_until_invalidated() {
        let (store, engine) = seeded().await;
        let dev = identity(4, Role::Developer);
        assert!(
            !engine
                .authorize_permission(&dev, "projects", Action::Read)
                .await
                .unwrap()
        );

        store
            .seed_role_permissions(&[RolePermission::new(Role::Developer, "projects", Action::Read)])
            .await
            .unwrap();
        assert!(
            !engine
                .authorize_permission(&dev, "projects", Action::Read)
                .await
                .unwrap()
        );

        engine.invalidate().await;
        assert!(
            engine
                .authorize_permission(&dev, "projects", Action::Read)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn load_racing_an_invalidation_is_not_cached() {
        let (store, engine) = seeded().await;
        let dev = identity(4, Role::Developer);

        let generation = engine.cache.read().await.generation;
        let stale: Arc<PermissionSet> = Arc::new(HashSet::new());
        engine.invalidate().await;
        engine
            .cache_if_current(Role::Developer, stale, generation)
            .await;
        assert!(engine.cache.read().await.sets.is_empty());

        store
            .seed_role_permissions(&[RolePermission::new(Role::Developer, "projects", Action::Read)])
            .await
            .unwrap();
        assert!(
            engine
                .authorize_permission(&dev, "projects", Action::Read)
                .await
                .unwrap()
        );
    }

    #[test]
    fn role_gate() {
        let admin = identity(1, Role::Admin);
        let rep = identity(3, Role::SalesRep);
        assert!(AuthorizationEngine::authorize_role(&admin, &[Role::Admin]));
        assert!(!AuthorizationEngine::authorize_role(&rep, &[Role::Admin, Role::Manager]));
        assert!(!AuthorizationEngine::authorize_role(&admin, &[]));
    }

    #[test]
    fn data_filters_by_role() {
        let admin = AuthorizationEngine::data_filter_for(&identity(1, Role::Admin), Some("companies"));
        assert!(admin.is_unrestricted());
        assert_eq!(serde_json::to_value(&admin).unwrap(), serde_json::json!({}));

        let manager = AuthorizationEngine::data_filter_for(&identity(2, Role::Manager), None);
        assert!(manager.is_unrestricted());

        let rep = AuthorizationEngine::data_filter_for(&identity(3, Role::SalesRep), Some("companies"));
        assert_eq!(
            serde_json::to_value(&rep).unwrap(),
            serde_json::json!({"assignedOnly": true, "userId": 3})
        );

        let dev = identity(4, Role::Developer);
        assert!(AuthorizationEngine::data_filter_for(&dev, Some(FEEDBACK_RESOURCE)).is_unrestricted());
        assert_eq!(
            AuthorizationEngine::data_filter_for(&dev, Some("companies")),
            DataFilter {
                read_only: true,
                ..Default::default()
            }
        );
        assert!(AuthorizationEngine::data_filter_for(&dev, None).read_only);
    }
}
