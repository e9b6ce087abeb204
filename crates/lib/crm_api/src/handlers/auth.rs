//! Authentication request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::Json;
use crm_core::auth::AuthError;
use crm_core::models::auth::ProfileUpdate;
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, ProfileResponse,
};

/// `POST /auth/login`: authenticate with username or email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(body) = body?;
    let (Some(username), Some(password)) = (
        body.username.filter(|u| !u.is_empty()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation(
            "Username and password are required".into(),
        ));
    };

    let outcome = state.sessions.login(&username, &password).await?;
    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token: outcome.token,
        user: outcome.user,
    }))
}

/// `POST /auth/logout`: revoke every session of the caller.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
) -> AppResult<Json<MessageResponse>> {
    state.sessions.logout(identity.user_id).await?;
    Ok(Json(MessageResponse::new("Logout successful")))
}

/// `GET /auth/profile`: the caller's identity as carried by the token.
pub async fn profile_handler(
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
) -> Json<ProfileResponse> {
    Json(ProfileResponse { user: identity })
}

/// `PUT /auth/profile`: update the caller's name and email.
pub async fn update_profile_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(update) = body?;
    if update.email.as_deref().is_some_and(|e| e.trim().is_empty()) {
        return Err(AppError::Validation("Email must not be empty".into()));
    }
    if !state.store.update_profile(identity.user_id, update).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    info!(user_id = identity.user_id, "profile updated");
    Ok(Json(MessageResponse::new("Profile updated successfully")))
}

/// `PUT /auth/change-password`: replace the caller's password.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(body) = body?;
    let (Some(current), Some(new)) = (
        body.current_password.filter(|p| !p.is_empty()),
        body.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation(
            "Current password and new password are required".into(),
        ));
    };

    match state
        .sessions
        .change_password(identity.user_id, &current, &new)
        .await
    {
        Ok(()) => Ok(Json(MessageResponse::new("Password updated successfully"))),
        Err(AuthError::InvalidCredentials) => Err(AppError::Validation(
            "Current password is incorrect".into(),
        )),
        Err(e) => Err(e.into()),
    }
}
