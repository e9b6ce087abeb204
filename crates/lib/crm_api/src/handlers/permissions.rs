//! Role permission listing.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;
use crm_core::models::auth::Role;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{PermissionEntry, PermissionsResponse};

/// `GET /auth/permissions/{role}`: the role's grants, sorted by resource
/// then action.
pub async fn role_permissions_handler(
    State(state): State<AppState>,
    role: Result<Path<String>, PathRejection>,
) -> AppResult<Json<PermissionsResponse>> {
    let Path(role) = role?;
    let role: Role = role
        .parse()
        .map_err(|_| AppError::Validation(format!("Unknown role: {role}")))?;

    let rows = state.gate.engine().role_permissions(role).await?;
    Ok(Json(PermissionsResponse {
        data: rows.into_iter().map(PermissionEntry::from).collect(),
    }))
}
