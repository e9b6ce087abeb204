//! Bootstrap data: the default role/permission table and demo users.

use tracing::{info, warn};

use super::AuthError;
use super::session::{SessionManager, UserFields};
use super::store::CredentialStore;
use crate::models::auth::Action::{Create as C, Delete as D, Export as E, Read as R, Update as U};
use crate::models::auth::{Action, Role, RolePermission};

/// Resource tag for feedback items. Developers get unrestricted visibility here.
pub const FEEDBACK_RESOURCE: &str = "feedbacks";

/// Resource tag for user management.
pub const USERS_RESOURCE: &str = "users";

const ADMIN: &[(&str, &[Action])] = &[
    ("users", &[C, R, U, D]),
    ("companies", &[C, R, U, D, E]),
    ("contacts", &[C, R, U, D, E]),
    ("feedbacks", &[C, R, U, D, E]),
    ("projects", &[C, R, U, D, E]),
    ("tasks", &[C, R, U, D, E]),
    ("team_members", &[C, R, U, D]),
    ("analytics", &[R]),
    ("settings", &[U]),
];

const MANAGER: &[(&str, &[Action])] = &[
    ("companies", &[R, U, E]),
    ("contacts", &[R, U, E]),
    ("feedbacks", &[R, U]),
    ("projects", &[C, R, U, D]),
    ("tasks", &[C, R, U, D]),
    ("team_members", &[R, U]),
    ("analytics", &[R]),
];

const SALES_REP: &[(&str, &[Action])] = &[
    ("companies", &[R, U]),
    ("contacts", &[C, R, U]),
    ("feedbacks", &[R]),
    ("projects", &[R]),
    ("tasks", &[R, U]),
    ("analytics", &[R]),
];

const DEVELOPER: &[(&str, &[Action])] = &[
    ("companies", &[R]),
    ("contacts", &[R]),
    ("feedbacks", &[C, R, U]),
    ("tasks", &[R, U]),
    ("analytics", &[R]),
];

fn grants_for(role: Role) -> &'static [(&'static str, &'static [Action])] {
    match role {
        Role::Admin => ADMIN,
        Role::Manager => MANAGER,
        Role::SalesRep => SALES_REP,
        Role::Developer => DEVELOPER,
    }
}

/// The full bootstrap role/permission table.
pub fn default_role_permissions() -> Vec<RolePermission> {
    Role::ALL
        .into_iter()
        .flat_map(|role| {
            grants_for(role).iter().flat_map(move |(resource, actions)| {
                actions
                    .iter()
                    .map(move |action| RolePermission::new(role, *resource, *action))
            })
        })
        .collect()
}

/// Insert the default permission table, skipping rows already present.
pub async fn seed_role_permissions(store: &dyn CredentialStore) -> Result<u64, AuthError> {
    let inserted = store
        .seed_role_permissions(&default_role_permissions())
        .await?;
    info!(inserted, "role permissions seeded");
    Ok(inserted)
}

/// Demo accounts for local development: `(username, email, password, role, first, last)`.
const DEMO_USERS: &[(&str, &str, &str, Role, &str, &str)] = &[
    ("admin", "admin@crm.com", "admin123", Role::Admin, "System", "Administrator"),
    ("manager1", "manager@crm.com", "manager123", Role::Manager, "John", "Manager"),
    ("sales1", "sales@crm.com", "sales123", Role::SalesRep, "Sarah", "Sales"),
    ("dev1", "developer@crm.com", "dev123", Role::Developer, "Mike", "Developer"),
    ("sales2", "alice.sales@crm.com", "sales123", Role::SalesRep, "Alice", "Johnson"),
];

/// Create the demo accounts. Existing usernames/emails are skipped.
pub async fn seed_demo_users(sessions: &SessionManager) -> Result<usize, AuthError> {
    let mut created = 0;
    for (username, email, password, role, first, last) in DEMO_USERS {
        let fields = UserFields {
            username: (*username).to_string(),
            email: (*email).to_string(),
            password: (*password).to_string(),
            role: *role,
            first_name: Some((*first).to_string()),
            last_name: Some((*last).to_string()),
        };
        match sessions.register(fields).await {
            Ok(user) => {
                info!(username = %user.username, role = %user.role, "created demo user");
                created += 1;
            }
            Err(AuthError::DuplicateIdentity) => {
                info!(username, "demo user already exists, skipping");
            }
            Err(e) => {
                warn!(username, error = %e, "failed to create demo user");
                return Err(e);
            }
        }
    }
    Ok(created)
}
