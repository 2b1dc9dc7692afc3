//! Audit trail engine.
//!
//! Appends security-relevant events and serves the administrative
//! query/aggregation views. Recording never fails its caller: audit
//! write errors are logged and dropped so they cannot break the primary
//! request flow.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::AuditEntry;
use crate::services::CredentialError;
use crate::store::{AuditFilter, CredentialStore, SeverityCounts};

const MAX_PAGE_SIZE: u32 = 500;

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn CredentialStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Append an audit entry. Never propagates failure.
    pub async fn record(&self, entry: AuditEntry) {
        if entry.severity.is_security_relevant() {
            tracing::warn!(
                action = entry.action.as_str(),
                severity = entry.severity.as_str(),
                tenant_id = %entry.tenant_id,
                "Security event"
            );
        }

        if let Err(e) = self.store.append_audit_entry(&entry).await {
            tracing::error!(
                error = %e,
                action = entry.action.as_str(),
                "Failed to write audit entry"
            );
        }
    }

    /// Query audit entries newest-first. Returns the page plus the total
    /// count over the whole filtered set.
    pub async fn query(
        &self,
        filter: AuditFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<AuditEntry>, u64), CredentialError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        Ok(self
            .store
            .query_audit_entries(&filter, page, page_size)
            .await?)
    }

    /// Like `query`, restricted to security-relevant entries.
    pub async fn security_query(
        &self,
        mut filter: AuditFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<AuditEntry>, u64), CredentialError> {
        filter.security_only = true;
        self.query(filter, page, page_size).await
    }

    /// Severity histogram for a tenant over a time range, aggregated
    /// store-side over the full range.
    pub async fn stats(
        &self,
        tenant_id: Uuid,
        from_utc: Option<DateTime<Utc>>,
        to_utc: Option<DateTime<Utc>>,
    ) -> Result<SeverityCounts, CredentialError> {
        Ok(self
            .store
            .audit_severity_counts(tenant_id, from_utc, to_utc)
            .await?)
    }
}
