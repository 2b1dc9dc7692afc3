//! Administrative audit views.
//!
//! All three endpoints sit behind the admin-only authorization guard and
//! are scoped to the authenticated admin's tenant.

use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::audit::{
    AuditEntriesQuery, AuditEntriesResponse, AuditStatsQuery, AuditStatsResponse,
};
use crate::middleware::AuthPrincipal;
use crate::store::AuditFilter;
use crate::AppState;

fn filter_from_query(tenant_id: uuid::Uuid, query: &AuditEntriesQuery) -> AuditFilter {
    let mut filter = AuditFilter::for_tenant(tenant_id);
    filter.actor = query.actor;
    filter.action = query.action;
    filter.severity = query.severity;
    filter.from_utc = query.from_utc;
    filter.to_utc = query.to_utc;
    filter
}

/// List audit entries with filtering and pagination, newest first.
///
/// GET /audit/entries
#[tracing::instrument(
    skip(state, admin),
    fields(
        action = ?query.action,
        severity = ?query.severity,
        page = query.page,
        page_size = query.page_size
    )
)]
pub async fn list_audit_entries(
    State(state): State<AppState>,
    admin: AuthPrincipal,
    Query(query): Query<AuditEntriesQuery>,
) -> Result<Json<AuditEntriesResponse>, AppError> {
    let filter = filter_from_query(admin.0.tenant_id, &query);
    let (entries, total) = state.audit.query(filter, query.page, query.page_size).await?;

    Ok(Json(AuditEntriesResponse {
        entries,
        total,
        page: query.page.max(1),
        page_size: query.page_size,
    }))
}

/// List security-relevant audit entries (high/critical severity, or
/// failed-login/reuse/denied actions).
///
/// GET /audit/security
#[tracing::instrument(skip(state, admin), fields(page = query.page, page_size = query.page_size))]
pub async fn security_events(
    State(state): State<AppState>,
    admin: AuthPrincipal,
    Query(query): Query<AuditEntriesQuery>,
) -> Result<Json<AuditEntriesResponse>, AppError> {
    let filter = filter_from_query(admin.0.tenant_id, &query);
    let (entries, total) = state
        .audit
        .security_query(filter, query.page, query.page_size)
        .await?;

    Ok(Json(AuditEntriesResponse {
        entries,
        total,
        page: query.page.max(1),
        page_size: query.page_size,
    }))
}

/// Severity histogram over the full filtered time range.
///
/// GET /audit/stats
#[tracing::instrument(skip(state, admin))]
pub async fn audit_stats(
    State(state): State<AppState>,
    admin: AuthPrincipal,
    Query(query): Query<AuditStatsQuery>,
) -> Result<Json<AuditStatsResponse>, AppError> {
    let counts = state
        .audit
        .stats(admin.0.tenant_id, query.from_utc, query.to_utc)
        .await?;
    let total = counts.total();

    Ok(Json(AuditStatsResponse { counts, total }))
}
