//! Application error types.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crm_core::auth::AuthError;
use crm_core::auth::gate::Rejection;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
///
/// The display string is the client-facing message, except for `Internal`
/// whose detail is only logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            AppError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => AppError::Unauthorized(e.to_string()),
            AuthError::DuplicateIdentity => AppError::Validation(e.to_string()),
            AuthError::TokenInvalid | AuthError::TokenExpired => {
                AppError::Forbidden("Invalid or expired token".into())
            }
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Store(msg) | AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<Rejection> for AppError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::AuthRequired => AppError::Unauthorized(r.to_string()),
            Rejection::InvalidToken(_)
            | Rejection::InsufficientRole
            | Rejection::InsufficientPermission => AppError::Forbidden(r.to_string()),
            Rejection::Store(detail) => AppError::Internal(detail),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(r: JsonRejection) -> Self {
        AppError::Validation(r.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(r: PathRejection) -> Self {
        AppError::Validation(r.body_text())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use crm_core::auth::gate::TokenFault;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let (status, body) = body_of(AppError::Internal("pool timed out".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn token_faults_collapse_to_one_message() {
        for fault in [TokenFault::Invalid, TokenFault::Expired, TokenFault::SessionInactive] {
            let (status, body) = body_of(Rejection::InvalidToken(fault).into()).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body["error"], "Invalid or expired token");
        }
        let (status, body) = body_of(AuthError::TokenExpired.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn taxonomy_status_codes() {
        let cases: Vec<(AppError, StatusCode, &str)> = vec![
            (Rejection::AuthRequired.into(), StatusCode::UNAUTHORIZED, "Access token required"),
            (Rejection::InsufficientRole.into(), StatusCode::FORBIDDEN, "Insufficient permissions"),
            (
                Rejection::InsufficientPermission.into(),
                StatusCode::FORBIDDEN,
                "Insufficient permissions for this action",
            ),
            (AuthError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED, "Invalid credentials"),
            (
                AuthError::DuplicateIdentity.into(),
                StatusCode::BAD_REQUEST,
                "Username or email already exists",
            ),
            (AuthError::Store("boom".into()).into(), StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        ];
        for (err, status, message) in cases {
            let (got_status, body) = body_of(err).await;
            assert_eq!(got_status, status);
            assert_eq!(body, serde_json::json!({ "error": message }));
        }
    }
}
