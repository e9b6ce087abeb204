//! # crm_api
//!
//! HTTP API library for Startup CRM authentication.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use crm_core::auth::authz::AuthorizationEngine;
use crm_core::auth::gate::{RequestGate, Requirement};
use crm_core::auth::jwt::TokenCodec;
use crm_core::auth::password::PasswordHasher;
use crm_core::auth::session::SessionManager;
use crm_core::auth::store::CredentialStore;
use crm_core::models::auth::Role;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, permissions, users};
use crate::middleware::auth::{RouteGuard, enforce, require_auth};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Users, sessions and role permissions.
    pub store: Arc<dyn CredentialStore>,
    /// Login, logout and account creation.
    pub sessions: Arc<SessionManager>,
    /// Per-request authentication and authorization.
    pub gate: Arc<RequestGate>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the auth core over `store` with production password hashing.
    pub fn new(store: Arc<dyn CredentialStore>, config: ApiConfig) -> Self {
        Self::with_hasher(store, config, PasswordHasher::default())
    }

    pub fn with_hasher(
        store: Arc<dyn CredentialStore>,
        config: ApiConfig,
        hasher: PasswordHasher,
    ) -> Self {
        let codec = Arc::new(TokenCodec::new(
            config.jwt_secret.as_bytes(),
            config.session_ttl,
        ));
        let engine = Arc::new(AuthorizationEngine::new(store.clone()));
        let sessions = Arc::new(SessionManager::new(store.clone(), hasher, codec.clone()));
        let gate = Arc::new(RequestGate::new(codec, store.clone(), engine));
        Self {
            store,
            sessions,
            gate,
            config,
        }
    }
}

/// Builds the Axum router with the auth routes only.
pub fn router(state: AppState) -> Router {
    router_with(state, Router::new())
}

/// Builds the Axum router, mounting `resources` (the CRUD routers) behind the
/// request gate alongside the auth routes.
///
/// Handlers in `resources` find the caller's
/// [`AuthenticatedUser`](middleware::auth::AuthenticatedUser) and
/// [`DataFilter`](crm_core::auth::authz::DataFilter) in request extensions,
/// and may add per-route requirements with [`RouteGuard`].
pub fn router_with(state: AppState, resources: Router<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler));

    // Admin-only user management
    let admin = Router::new()
        .route(
            routes::AUTH_USERS,
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route(
            routes::AUTH_USERS_ID,
            put(users::update_user_handler).delete(users::delete_user_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            RouteGuard::new(&state, Requirement::roles(&[Role::Admin])),
            enforce,
        ));

    let role_permissions = Router::new()
        .route(
            routes::GET_AUTH_PERMISSIONS_ROLE,
            get(permissions::role_permissions_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            RouteGuard::new(&state, Requirement::roles(&[Role::Admin, Role::Manager])),
            enforce,
        ));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(
            routes::AUTH_PROFILE,
            get(auth::profile_handler).put(auth::update_profile_handler),
        )
        .route(
            routes::PUT_AUTH_CHANGE_PASSWORD,
            put(auth::change_password_handler),
        )
        .merge(admin)
        .merge(role_permissions)
        .merge(resources)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
