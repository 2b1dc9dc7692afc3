//! In-memory credential store for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{AuditFilter, CredentialStore, SeverityCounts, StoreError};
use crate::models::{AuditEntry, RefreshFamily};

#[derive(Default)]
pub struct MemoryStore {
    families: Mutex<HashMap<Uuid, RefreshFamily>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded audit entries, in append order.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn lock_families(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, RefreshFamily>>, StoreError> {
        self.families
            .lock()
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!("family mutex poisoned: {}", e)))
    }

    fn lock_audit(&self) -> Result<std::sync::MutexGuard<'_, Vec<AuditEntry>>, StoreError> {
        self.audit
            .lock()
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!("audit mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_family(&self, family: &RefreshFamily) -> Result<(), StoreError> {
        self.lock_families()?
            .insert(family.family_id, family.clone());
        Ok(())
    }

    async fn get_family(&self, family_id: Uuid) -> Result<Option<RefreshFamily>, StoreError> {
        Ok(self.lock_families()?.get(&family_id).cloned())
    }

    async fn cas_advance_generation(
        &self,
        family_id: Uuid,
        from_generation: i64,
        new_refresh_id: Uuid,
        new_refresh_hash: &str,
        rotated_utc: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut families = self.lock_families()?;
        match families.get_mut(&family_id) {
            Some(family)
                if family.revoked_utc.is_none() && family.generation == from_generation =>
            {
                family.generation = from_generation + 1;
                family.current_refresh_id = new_refresh_id;
                family.refresh_token_hash = new_refresh_hash.to_string();
                family.rotated_utc = rotated_utc;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_family(
        &self,
        family_id: Uuid,
        revoked_utc: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(family) = self.lock_families()?.get_mut(&family_id) {
            family.revoked_utc.get_or_insert(revoked_utc);
        }
        Ok(())
    }

    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.lock_audit()?.push(entry.clone());
        Ok(())
    }

    async fn query_audit_entries(
        &self,
        filter: &AuditFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<AuditEntry>, u64), StoreError> {
        let mut matched: Vec<AuditEntry> = self
            .lock_audit()?
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));

        let total = matched.len() as u64;
        let offset = (page.saturating_sub(1) as usize) * page_size as usize;
        let entries = matched
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Ok((entries, total))
    }

    async fn audit_severity_counts(
        &self,
        tenant_id: Uuid,
        from_utc: Option<DateTime<Utc>>,
        to_utc: Option<DateTime<Utc>>,
    ) -> Result<SeverityCounts, StoreError> {
        let mut filter = AuditFilter::for_tenant(tenant_id);
        filter.from_utc = from_utc;
        filter.to_utc = to_utc;

        let mut counts = SeverityCounts::default();
        for entry in self.lock_audit()?.iter().filter(|e| filter.matches(e)) {
            counts.bump(entry.severity, 1);
        }
        Ok(counts)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
