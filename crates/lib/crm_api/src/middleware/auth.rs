//! Authentication middleware: bearer token verification and route guards.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use crm_core::auth::authz::AuthorizationEngine;
use crm_core::auth::gate::{Rejection, RequestGate, Requirement, bearer_token, resource_from_path};
use crm_core::models::auth::Identity;

use crate::AppState;
use crate::error::AppError;

/// Key used to store the caller's [`Identity`] in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

/// Axum middleware: verifies `Authorization: Bearer <token>` against the
/// token codec and the session table, then injects [`AuthenticatedUser`] and
/// the caller's [`DataFilter`](crm_core::auth::authz::DataFilter) into
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Owned copies: the request body is not `Sync`, so no borrow of the
    // request may live across the await below.
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let path = request.uri().path().to_owned();

    let identity = state.gate.authenticate(bearer_token(header.as_deref())).await?;
    let filter = AuthorizationEngine::data_filter_for(&identity, resource_from_path(&path));

    request.extensions_mut().insert(filter);
    request.extensions_mut().insert(AuthenticatedUser(identity));

    Ok(next.run(request).await)
}

/// State for [`enforce`]: the gate plus what one group of routes demands.
#[derive(Clone)]
pub struct RouteGuard {
    gate: Arc<RequestGate>,
    requirement: Arc<Requirement>,
}

impl RouteGuard {
    pub fn new(state: &AppState, requirement: Requirement) -> Self {
        Self {
            gate: state.gate.clone(),
            requirement: Arc::new(requirement),
        }
    }
}

/// Axum middleware: applies a [`RouteGuard`]'s role and permission gates.
/// Must run inside [`require_auth`].
pub async fn enforce(
    State(guard): State<RouteGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0.clone())
        .ok_or(Rejection::AuthRequired)?;

    guard.gate.authorize(&identity, &guard.requirement).await?;

    Ok(next.run(request).await)
}
