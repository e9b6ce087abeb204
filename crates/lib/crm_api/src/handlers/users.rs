//! Admin user management handlers.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use crm_core::auth::session::UserFields;
use crm_core::models::auth::UserUpdate;
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreateUserRequest, MessageResponse, UserResponse, UsersResponse};

/// `GET /auth/users`: every user, newest first.
pub async fn list_users_handler(State(state): State<AppState>) -> AppResult<Json<UsersResponse>> {
    let data = state.store.list_users().await?;
    Ok(Json(UsersResponse { data }))
}

/// `POST /auth/users`: create an account.
pub async fn create_user_handler(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let Json(body) = body?;
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(username), Some(email), Some(password), Some(role)) = (
        non_empty(body.username),
        non_empty(body.email),
        body.password.filter(|p| !p.is_empty()),
        body.role,
    ) else {
        return Err(AppError::Validation(
            "Username, email, password, and role are required".into(),
        ));
    };

    let user = state
        .sessions
        .register(UserFields {
            username,
            email,
            password,
            role,
            first_name: body.first_name,
            last_name: body.last_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "User created successfully".into(),
            user,
        }),
    ))
}

/// `PUT /auth/users/{id}`: partial update. A role change or deactivation
/// revokes the user's sessions.
pub async fn update_user_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> AppResult<Json<UserResponse>> {
    let Path(user_id) = id?;
    let Json(update) = body?;
    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&update.username) || blank(&update.email) {
        return Err(AppError::Validation(
            "Username and email must not be empty".into(),
        ));
    }

    let before = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?
        .user;

    let user = state
        .store
        .update_user(user_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if user.role != before.role || (before.is_active && !user.is_active) {
        state.sessions.logout(user_id).await?;
    }
    info!(user_id, role = %user.role, active = user.is_active, "user updated");

    Ok(Json(UserResponse {
        message: "User updated successfully".into(),
        user,
    }))
}

/// `DELETE /auth/users/{id}`: remove an account and its sessions.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Path(user_id) = id?;
    if user_id == caller.user_id {
        return Err(AppError::Validation("Cannot delete your own account".into()));
    }
    if !state.store.delete_user(user_id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    info!(user_id, deleted_by = caller.user_id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
