//! Request and response bodies.

use crm_core::models::auth::{Action, Identity, Role, RolePermission, User};
use serde::{Deserialize, Serialize};

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `POST /auth/login`. `username` may also hold an email address.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: Identity,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub user: Identity,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// `POST /auth/users`. Every field is checked by the handler so a missing
/// one yields the validation message rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsersResponse {
    pub data: Vec<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionEntry {
    pub resource: String,
    pub action: Action,
}

impl From<RolePermission> for PermissionEntry {
    fn from(p: RolePermission) -> Self {
        Self {
            resource: p.resource,
            action: p.action,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionsResponse {
    pub data: Vec<PermissionEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_request_tolerates_missing_fields() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"username":"bob","role":"Sales Rep"}"#).unwrap();
        assert_eq!(req.username.as_deref(), Some("bob"));
        assert_eq!(req.role, Some(Role::SalesRep));
        assert!(req.password.is_none());
    }

    #[test]
    fn permission_entry_shape() {
        let entry = PermissionEntry::from(RolePermission::new(Role::Manager, "companies", Action::Export));
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({"resource": "companies", "action": "export"})
        );
    }
}
