use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::{
    dtos::auth::{LoginRequest, LogoutRequest, RefreshRequest},
    middleware::AuthPrincipal,
    models::AuditEntry,
    services::CredentialError,
    utils::{verify_password, Password, PasswordHashString, ValidatedJson},
    AppState,
};

fn request_metadata(addr: &SocketAddr, headers: &HeaderMap) -> serde_json::Value {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    serde_json::json!({
        "ip": addr.ip().to_string(),
        "user_agent": user_agent,
    })
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 503, description = "Credential store unavailable", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let metadata = request_metadata(&addr, &headers);

    let user = state
        .directory
        .find_by_email(req.tenant_id, &req.email)
        .await
        .map_err(CredentialError::from)?;

    let user = match user {
        Some(user) if !user.disabled => user,
        other => {
            tracing::info!(tenant_id = %req.tenant_id, "Login failed");
            state
                .audit
                .record(AuditEntry::login_failed(
                    req.tenant_id,
                    other.map(|u| u.user_id),
                    metadata,
                ))
                .await;
            return Err(AppError::AuthError(anyhow::anyhow!(
                "Invalid email or password"
            )));
        }
    };

    if verify_password(
        &Password::new(req.password),
        &PasswordHashString::new(user.password_hash.clone()),
    )
    .is_err()
    {
        tracing::info!(user_id = %user.user_id, "Login failed");
        state
            .audit
            .record(AuditEntry::login_failed(
                req.tenant_id,
                Some(user.user_id),
                metadata,
            ))
            .await;
        return Err(AppError::AuthError(anyhow::anyhow!(
            "Invalid email or password"
        )));
    }

    let res = state.issuer.issue(user.principal(), metadata).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Refresh the credential pair using a refresh credential
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Credentials rotated", body = TokenResponse),
        (status = 401, description = "Invalid, revoked, or reused credential", body = ErrorResponse),
        (status = 503, description = "Credential store unavailable", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let metadata = request_metadata(&addr, &headers);
    let res = state.issuer.rotate(&req.refresh_token, metadata).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Logout: revoke the session's refresh family
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out successfully"),
        (status = 400, description = "Malformed refresh credential", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    principal: AuthPrincipal,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = principal.0;

    let claims = state
        .jwt
        .verify_refresh(&req.refresh_token)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid refresh credential")))?;

    // A principal can only close its own session
    if claims.sub != principal.id {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Refresh credential does not belong to this principal"
        )));
    }

    state.issuer.revoke(claims.fam).await?;

    let mut metadata = request_metadata(&addr, &headers);
    if let Some(map) = metadata.as_object_mut() {
        map.insert(
            "family_id".to_string(),
            serde_json::Value::String(claims.fam.to_string()),
        );
    }
    state
        .audit
        .record(AuditEntry::logout(&principal, metadata))
        .await;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Logged out successfully"
        })),
    ))
}
