//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
/// `GET` reads, `PUT` updates the caller's own profile.
pub const AUTH_PROFILE: &str = "/auth/profile";
pub const PUT_AUTH_CHANGE_PASSWORD: &str = "/auth/change-password";

/// `GET` lists, `POST` creates.
pub const AUTH_USERS: &str = "/auth/users";
/// `PUT` updates, `DELETE` removes.
pub const AUTH_USERS_ID: &str = "/auth/users/{id}";

pub const GET_AUTH_PERMISSIONS_ROLE: &str = "/auth/permissions/{role}";
