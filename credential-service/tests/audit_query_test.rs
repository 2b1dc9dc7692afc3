mod common;

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use credential_service::{
    build_router,
    models::{AuditAction, AuditEntry, Principal, Role, Severity},
    store::CredentialStore,
};
use std::net::SocketAddr;
use tower::util::ServiceExt;
use uuid::Uuid;

use common::{context, TestContext};

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_as_admin(
    app: &axum::Router,
    ctx: &TestContext,
    uri: &str,
) -> axum::response::Response {
    let principal = Principal {
        id: Uuid::new_v4(),
        role: Role::Admin,
        tenant_id: ctx.tenant_id,
    };
    let token = ctx.jwt.sign_access(&principal).unwrap();

    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Seed 3 info, 1 high, 1 critical entries at distinct, ascending times.
async fn seed_entries(ctx: &TestContext) -> Vec<AuditEntry> {
    let base = Utc::now() - Duration::minutes(30);
    let actor = Uuid::new_v4();
    let specs = [
        (AuditAction::LoginSuccess, Severity::Info),
        (AuditAction::TokenRefreshed, Severity::Info),
        (AuditAction::Logout, Severity::Info),
        (AuditAction::LoginFailed, Severity::High),
        (AuditAction::TokenReuseDetected, Severity::Critical),
    ];

    let mut entries = Vec::new();
    for (i, (action, severity)) in specs.into_iter().enumerate() {
        let mut entry = AuditEntry::new(
            ctx.tenant_id,
            Some(actor),
            action,
            severity,
            None,
            serde_json::json!({ "seq": i }),
        );
        entry.created_utc = base + Duration::minutes(i as i64);
        ctx.state.store.append_audit_entry(&entry).await.unwrap();
        entries.push(entry);
    }
    entries
}

#[tokio::test]
async fn test_stats_counts_full_range_regardless_of_paging() {
    let ctx = context();
    seed_entries(&ctx).await;

    let app = build_router(ctx.state.clone())
        .await
        .unwrap()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    let response = get_as_admin(&app, &ctx, "/audit/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["counts"]["info"], 3);
    assert_eq!(body["counts"]["low"], 0);
    assert_eq!(body["counts"]["medium"], 0);
    assert_eq!(body["counts"]["high"], 1);
    assert_eq!(body["counts"]["critical"], 1);
    assert_eq!(body["total"], 5);
}

#[tokio::test]
async fn test_stats_respects_time_range() {
    let ctx = context();
    let entries = seed_entries(&ctx).await;

    let app = build_router(ctx.state.clone())
        .await
        .unwrap()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    // Exclude everything before the fourth entry
    let from = entries[3].created_utc;
    let uri = format!(
        "/audit/stats?from_utc={}",
        from.to_rfc3339().replace('+', "%2B")
    );
    let response = get_as_admin(&app, &ctx, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["counts"]["info"], 0);
    assert_eq!(body["counts"]["high"], 1);
    assert_eq!(body["counts"]["critical"], 1);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_entries_are_newest_first_with_total() {
    let ctx = context();
    let entries = seed_entries(&ctx).await;

    let app = build_router(ctx.state.clone())
        .await
        .unwrap()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    let response = get_as_admin(&app, &ctx, "/audit/entries?page=1&page_size=2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["total"], 5);
    assert_eq!(body["page_size"], 2);
    let page = body["entries"].as_array().unwrap();
    assert_eq!(page.len(), 2);
    // The last-seeded entry is the newest
    assert_eq!(page[0]["id"], serde_json::json!(entries[4].id));
    assert_eq!(page[1]["id"], serde_json::json!(entries[3].id));

    // The final page holds the single oldest entry; total is unchanged
    let response = get_as_admin(&app, &ctx, "/audit/entries?page=3&page_size=2").await;
    let body = json_body(response).await;
    assert_eq!(body["total"], 5);
    let page = body["entries"].as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["id"], serde_json::json!(entries[0].id));
}

#[tokio::test]
async fn test_entry_filters() {
    let ctx = context();
    seed_entries(&ctx).await;

    let app = build_router(ctx.state.clone())
        .await
        .unwrap()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    let response = get_as_admin(&app, &ctx, "/audit/entries?severity=info").await;
    let body = json_body(response).await;
    assert_eq!(body["total"], 3);

    let response = get_as_admin(&app, &ctx, "/audit/entries?action=token_reuse_detected").await;
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["entries"][0]["severity"], "critical");
}

#[tokio::test]
async fn test_security_view_is_restricted() {
    let ctx = context();
    seed_entries(&ctx).await;

    // An access_denied entry is security-relevant despite medium severity
    let principal = Principal {
        id: Uuid::new_v4(),
        role: Role::Staff,
        tenant_id: ctx.tenant_id,
    };
    ctx.state
        .store
        .append_audit_entry(&AuditEntry::access_denied(&principal, "/audit/entries"))
        .await
        .unwrap();

    let app = build_router(ctx.state.clone())
        .await
        .unwrap()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    let response = get_as_admin(&app, &ctx, "/audit/security").await;
    let body = json_body(response).await;

    // high + critical + access_denied; the three info entries are excluded
    assert_eq!(body["total"], 3);
    for entry in body["entries"].as_array().unwrap() {
        let severity = entry["severity"].as_str().unwrap();
        let action = entry["action"].as_str().unwrap();
        assert!(
            matches!(severity, "high" | "critical")
                || matches!(action, "login_failed" | "token_reuse_detected" | "access_denied"),
            "unexpected entry in security view: {} / {}",
            action,
            severity
        );
    }
}

#[tokio::test]
async fn test_audit_views_are_tenant_scoped() {
    let ctx = context();
    seed_entries(&ctx).await;

    // An entry for a different tenant must stay invisible
    let foreign = AuditEntry::new(
        Uuid::new_v4(),
        None,
        AuditAction::TokenReuseDetected,
        Severity::Critical,
        None,
        serde_json::json!({}),
    );
    ctx.state.store.append_audit_entry(&foreign).await.unwrap();

    let app = build_router(ctx.state.clone())
        .await
        .unwrap()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    let response = get_as_admin(&app, &ctx, "/audit/entries").await;
    let body = json_body(response).await;
    assert_eq!(body["total"], 5);

    let response = get_as_admin(&app, &ctx, "/audit/stats").await;
    let body = json_body(response).await;
    assert_eq!(body["counts"]["critical"], 1);
}
