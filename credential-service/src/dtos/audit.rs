use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AuditAction, AuditEntry, Severity};
use crate::store::SeverityCounts;

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

/// Query params for the audit entry views. Tenant scope comes from the
/// authenticated admin principal, never from the query string.
#[derive(Debug, Deserialize)]
pub struct AuditEntriesQuery {
    pub actor: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub severity: Option<Severity>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuditStatsQuery {
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
}

/// Paginated audit entries, newest first.
#[derive(Debug, Serialize)]
pub struct AuditEntriesResponse {
    pub entries: Vec<AuditEntry>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
pub struct AuditStatsResponse {
    pub counts: SeverityCounts,
    pub total: u64,
}
