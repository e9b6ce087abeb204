//! Request gate: the enforcement point for every protected request.
//!
//! Per request: bearer token → verified claims → live session → role gate →
//! permission gate → data filter. Any failure is terminal for the request.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error};

use super::AuthError;
use super::authz::{AuthorizationEngine, DataFilter};
use super::jwt::{TokenCodec, fingerprint};
use super::store::CredentialStore;
use crate::models::auth::{Action, Identity, Role};

/// Why a request was turned away.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("Access token required")]
    AuthRequired,

    #[error("Invalid or expired token")]
    InvalidToken(TokenFault),

    #[error("Insufficient permissions")]
    InsufficientRole,

    #[error("Insufficient permissions for this action")]
    InsufficientPermission,

    #[error("Internal server error")]
    Store(String),
}

/// Diagnostic detail behind [`Rejection::InvalidToken`]. Never shown to the
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFault {
    Invalid,
    Expired,
    /// Signature and expiry are fine but the session was revoked, expired
    /// server-side, or never recorded.
    SessionInactive,
}

/// What a route demands beyond authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    /// Empty means no role gate.
    pub roles: Vec<Role>,
    pub permission: Option<(String, Action)>,
}

impl Requirement {
    pub fn roles(roles: &[Role]) -> Self {
        Self {
            roles: roles.to_vec(),
            permission: None,
        }
    }

    pub fn permission(resource: impl Into<String>, action: Action) -> Self {
        Self {
            roles: Vec::new(),
            permission: Some((resource.into(), action)),
        }
    }

    pub fn and_permission(mut self, resource: impl Into<String>, action: Action) -> Self {
        self.permission = Some((resource.into(), action));
        self
    }
}

/// Terminal success: who is calling and what they may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub identity: Identity,
    pub filter: DataFilter,
}

/// Capability-shaped enforcement point any routing layer can mount.
pub struct RequestGate {
    codec: Arc<TokenCodec>,
    store: Arc<dyn CredentialStore>,
    engine: Arc<AuthorizationEngine>,
}

impl RequestGate {
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn CredentialStore>,
        engine: Arc<AuthorizationEngine>,
    ) -> Self {
        Self {
            codec,
            store,
            engine,
        }
    }

    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    /// Verify the bearer token and its session, yielding the caller's identity.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<Identity, Rejection> {
        let token = bearer
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Rejection::AuthRequired)?;

        let claims = self.codec.verify(token).map_err(|e| {
            let fault = match e {
                AuthError::TokenExpired => TokenFault::Expired,
                _ => TokenFault::Invalid,
            };
            debug!(?fault, "bearer token rejected");
            Rejection::InvalidToken(fault)
        })?;

        let session = self
            .store
            .find_session(&fingerprint(token))
            .await
            .map_err(store_failure)?;
        match session {
            Some(s) if s.is_live(Utc::now()) && s.user_id == claims.identity.user_id => {
                Ok(claims.identity)
            }
            _ => {
                debug!(user_id = claims.identity.user_id, "no live session for token");
                Err(Rejection::InvalidToken(TokenFault::SessionInactive))
            }
        }
    }

    /// Apply the route's role and permission gates.
    pub async fn authorize(
        &self,
        identity: &Identity,
        requirement: &Requirement,
    ) -> Result<(), Rejection> {
        if !requirement.roles.is_empty()
            && !AuthorizationEngine::authorize_role(identity, &requirement.roles)
        {
            debug!(user_id = identity.user_id, role = %identity.role, "role gate denied");
            return Err(Rejection::InsufficientRole);
        }
        if let Some((resource, action)) = &requirement.permission {
            let allowed = self
                .engine
                .authorize_permission(identity, resource, *action)
                .await
                .map_err(store_failure)?;
            if !allowed {
                debug!(
                    user_id = identity.user_id,
                    role = %identity.role,
                    resource = %resource,
                    action = %action,
                    "permission gate denied"
                );
                return Err(Rejection::InsufficientPermission);
            }
        }
        Ok(())
    }

    /// Run the whole state machine for one request.
    pub async fn admit(
        &self,
        bearer: Option<&str>,
        requirement: &Requirement,
        resource: Option<&str>,
    ) -> Result<Admission, Rejection> {
        let identity = self.authenticate(bearer).await?;
        self.authorize(&identity, requirement).await?;
        let filter = AuthorizationEngine::data_filter_for(&identity, resource);
        Ok(Admission { identity, filter })
    }
}

fn store_failure(e: AuthError) -> Rejection {
    error!(error = %e, "credential store failure in request gate");
    Rejection::Store(e.to_string())
}

/// Extract the token from an `Authorization` header value.
///
/// Anything other than `Bearer <token>` counts as no token.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Resource a request path targets: its first segment, skipping an `api`
/// prefix. `/api/feedbacks/3` → `feedbacks`.
pub fn resource_from_path(path: &str) -> Option<&str> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match segments.next()? {
        "api" => segments.next(),
        first => Some(first),
    }
}
