mod common;

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
};
use credential_service::{
    build_router,
    models::{AuditAction, Principal, Role},
    services::JwtSigner,
};
use std::net::SocketAddr;
use tower::util::ServiceExt;
use uuid::Uuid;

use common::{context, TestContext};

fn get_with_token(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn app(ctx: &TestContext) -> axum::Router {
    build_router(ctx.state.clone())
        .await
        .expect("Failed to build router")
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
}

fn access_token_for(ctx: &TestContext, role: Role) -> (Principal, String) {
    let principal = Principal {
        id: Uuid::new_v4(),
        role,
        tenant_id: ctx.tenant_id,
    };
    let token = ctx.jwt.sign_access(&principal).unwrap();
    (principal, token)
}

#[tokio::test]
async fn test_admin_reaches_audit_views() {
    let ctx = context();
    let app = app(&ctx).await;
    let (_, token) = access_token_for(&ctx, Role::Admin);

    for uri in ["/audit/entries", "/audit/security", "/audit/stats"] {
        let response = app
            .clone()
            .oneshot(get_with_token(uri, Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "admin denied on {}", uri);
    }
}

#[tokio::test]
async fn test_staff_denied_with_single_audit_entry() {
    let ctx = context();
    let app = app(&ctx).await;
    let (principal, token) = access_token_for(&ctx, Role::Staff);

    let response = app
        .oneshot(get_with_token("/audit/entries", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let denied: Vec<_> = ctx
        .store
        .audit_entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::AccessDenied)
        .collect();
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].actor, Some(principal.id));
    assert_eq!(denied[0].resource.as_deref(), Some("/audit/entries"));
    assert_eq!(denied[0].tenant_id, ctx.tenant_id);
}

#[tokio::test]
async fn test_each_denied_call_records_one_entry() {
    let ctx = context();
    let app = app(&ctx).await;
    let (_, token) = access_token_for(&ctx, Role::Patient);

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(get_with_token("/audit/stats", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let denied = ctx
        .store
        .audit_entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::AccessDenied)
        .count();
    assert_eq!(denied, 3);
}

#[tokio::test]
async fn test_missing_and_malformed_credentials_are_unauthorized() {
    let ctx = context();
    let app = app(&ctx).await;

    let response = app
        .clone()
        .oneshot(get_with_token("/audit/entries", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get_with_token("/audit/entries", Some("not-a-jwt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Neither failure is an access_denied event: the caller never
    // authenticated
    assert!(ctx.store.audit_entries().is_empty());
}

#[tokio::test]
async fn test_expired_access_credential_is_unauthorized() {
    let ctx = context();
    let app = app(&ctx).await;

    // Same secret, zero-minute lifetime: expired the instant it is signed
    let mut expired_config = common::test_jwt_config();
    expired_config.access_token_expiry_minutes = 0;
    let expired_signer = JwtSigner::new(&expired_config);

    let principal = Principal {
        id: Uuid::new_v4(),
        role: Role::Admin,
        tenant_id: ctx.tenant_id,
    };
    let token = expired_signer.sign_access(&principal).unwrap();

    let response = app
        .oneshot(get_with_token("/audit/entries", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_any_authenticated_role_may_logout() {
    let ctx = context();
    let app = app(&ctx).await;

    let principal = Principal {
        id: Uuid::new_v4(),
        role: Role::Patient,
        tenant_id: ctx.tenant_id,
    };
    let issued = ctx
        .state
        .issuer
        .issue(principal.clone(), serde_json::json!({}))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", issued.access_token))
                .body(Body::from(
                    serde_json::json!({ "refresh_token": issued.refresh_token }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_rejects_foreign_refresh_credential() {
    let ctx = context();
    let app = app(&ctx).await;

    let (_, token) = access_token_for(&ctx, Role::Staff);
    let other = Principal {
        id: Uuid::new_v4(),
        role: Role::Staff,
        tenant_id: ctx.tenant_id,
    };
    let other_session = ctx
        .state
        .issuer
        .issue(other, serde_json::json!({}))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(
                    serde_json::json!({ "refresh_token": other_session.refresh_token })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
