//! Credential store boundary.
//!
//! The store exclusively owns refresh-family and audit-entry records.
//! Rotation safety rests on `cas_advance_generation` being a single
//! atomic conditional write; implementations must never realize it as a
//! read-then-write pair.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{AuditAction, AuditEntry, RefreshFamily, Severity};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient I/O failure. Not a security event; callers may retry.
    #[error("credential store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

/// Filters for audit queries. Tenant scope is mandatory.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub tenant_id: Uuid,
    pub actor: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub severity: Option<Severity>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    /// Restrict to security-relevant entries (high/critical severity or
    /// failed-login/reuse/denied actions).
    pub security_only: bool,
}

impl AuditFilter {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            actor: None,
            action: None,
            severity: None,
            from_utc: None,
            to_utc: None,
            security_only: false,
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if entry.tenant_id != self.tenant_id {
            return false;
        }
        if let Some(actor) = self.actor {
            if entry.actor != Some(actor) {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if entry.severity != severity {
                return false;
            }
        }
        if let Some(from) = self.from_utc {
            if entry.created_utc < from {
                return false;
            }
        }
        if let Some(to) = self.to_utc {
            if entry.created_utc >= to {
                return false;
            }
        }
        if self.security_only
            && !entry.severity.is_security_relevant()
            && !entry.action.is_security_relevant()
        {
            return false;
        }
        true
    }
}

/// Entry counts per severity bucket over a filtered range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SeverityCounts {
    pub info: u64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl SeverityCounts {
    pub fn bump(&mut self, severity: Severity, count: u64) {
        match severity {
            Severity::Info => self.info += count,
            Severity::Low => self.low += count,
            Severity::Medium => self.medium += count,
            Severity::High => self.high += count,
            Severity::Critical => self.critical += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.info + self.low + self.medium + self.high + self.critical
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_family(&self, family: &RefreshFamily) -> Result<(), StoreError>;

    async fn get_family(&self, family_id: Uuid) -> Result<Option<RefreshFamily>, StoreError>;

    /// Atomically advance a family from `from_generation` to the next
    /// generation, swapping in the new refresh credential. Returns false
    /// when the family is missing, revoked, or no longer at
    /// `from_generation` (a concurrent rotation won).
    async fn cas_advance_generation(
        &self,
        family_id: Uuid,
        from_generation: i64,
        new_refresh_id: Uuid,
        new_refresh_hash: &str,
        rotated_utc: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Mark a family revoked. Idempotent.
    async fn revoke_family(&self, family_id: Uuid, revoked_utc: DateTime<Utc>)
        -> Result<(), StoreError>;

    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    /// Query audit entries newest-first with the total count over the
    /// whole filtered set (not just the returned page).
    async fn query_audit_entries(
        &self,
        filter: &AuditFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<AuditEntry>, u64), StoreError>;

    /// Severity histogram over the full filtered range, computed store-side.
    async fn audit_severity_counts(
        &self,
        tenant_id: Uuid,
        from_utc: Option<DateTime<Utc>>,
        to_utc: Option<DateTime<Utc>>,
    ) -> Result<SeverityCounts, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
