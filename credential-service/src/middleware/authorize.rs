//! Authorization guard middleware.
//!
//! Verifies the request's access credential offline (signature + expiry,
//! no store lookup) and enforces role membership. Denied requests record
//! one `access_denied` audit entry; audit failures never surface to the
//! caller.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::dtos::ErrorResponse;
use crate::models::{AuditEntry, Principal, Role};
use crate::services::CredentialError;
use crate::AppState;

/// Per-route guard configuration. An empty role set admits any
/// authenticated principal.
#[derive(Clone)]
pub struct RoleGuard {
    state: AppState,
    required: Arc<Vec<Role>>,
}

impl RoleGuard {
    pub fn require(state: AppState, roles: &[Role]) -> Self {
        Self {
            state,
            required: Arc::new(roles.to_vec()),
        }
    }

    pub fn any_authenticated(state: AppState) -> Self {
        Self {
            state,
            required: Arc::new(Vec::new()),
        }
    }
}

/// Middleware enforcing authentication and role membership.
pub async fn authorize_middleware(
    State(guard): State<RoleGuard>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing or invalid Authorization header".to_string(),
                }),
            ));
        }
    };

    let principal = match guard.state.issuer.verify(token) {
        Ok(principal) => principal,
        Err(CredentialError::Expired) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Access credential expired".to_string(),
                }),
            ));
        }
        Err(_) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid credential".to_string(),
                }),
            ));
        }
    };

    if !guard.required.is_empty() && !guard.required.contains(&principal.role) {
        let resource = req.uri().path().to_string();
        tracing::warn!(
            principal_id = %principal.id,
            role = principal.role.as_str(),
            resource = %resource,
            "Access denied by role"
        );
        guard
            .state
            .audit
            .record(AuditEntry::access_denied(&principal, resource))
            .await;

        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Insufficient role for this resource".to_string(),
            }),
        ));
    }

    // Downstream handlers read the principal from request extensions
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Extractor for the authenticated principal in handlers
pub struct AuthPrincipal(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Principal missing from request extensions".to_string(),
            }),
        ))?;

        Ok(AuthPrincipal(principal.clone()))
    }
}
