//! PostgreSQL credential store.
//!
//! Generation advancement is a single conditional UPDATE checked through
//! `rows_affected`; the row is never read-modified-written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::{AuditFilter, CredentialStore, SeverityCounts, StoreError};
use crate::models::{AuditEntry, RefreshFamily, Severity};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn unavailable(e: sqlx::Error) -> StoreError {
        StoreError::Unavailable(anyhow::Error::new(e))
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    async fn insert_family(&self, family: &RefreshFamily) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_families
                (family_id, principal_id, tenant_id, role, generation,
                 current_refresh_id, refresh_token_hash, created_utc, rotated_utc, revoked_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(family.family_id)
        .bind(family.principal_id)
        .bind(family.tenant_id)
        .bind(family.role.as_str())
        .bind(family.generation)
        .bind(family.current_refresh_id)
        .bind(&family.refresh_token_hash)
        .bind(family.created_utc)
        .bind(family.rotated_utc)
        .bind(family.revoked_utc)
        .execute(&self.pool)
        .await
        .map_err(Self::unavailable)?;
        Ok(())
    }

    async fn get_family(&self, family_id: Uuid) -> Result<Option<RefreshFamily>, StoreError> {
        sqlx::query_as::<_, RefreshFamily>(
            "SELECT * FROM refresh_families WHERE family_id = $1",
        )
        .bind(family_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::unavailable)
    }

    async fn cas_advance_generation(
        &self,
        family_id: Uuid,
        from_generation: i64,
        new_refresh_id: Uuid,
        new_refresh_hash: &str,
        rotated_utc: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_families
            SET generation = generation + 1,
                current_refresh_id = $3,
                refresh_token_hash = $4,
                rotated_utc = $5
            WHERE family_id = $1 AND generation = $2 AND revoked_utc IS NULL
            "#,
        )
        .bind(family_id)
        .bind(from_generation)
        .bind(new_refresh_id)
        .bind(new_refresh_hash)
        .bind(rotated_utc)
        .execute(&self.pool)
        .await
        .map_err(Self::unavailable)?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_family(
        &self,
        family_id: Uuid,
        revoked_utc: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE refresh_families SET revoked_utc = $2 WHERE family_id = $1 AND revoked_utc IS NULL",
        )
        .bind(family_id)
        .bind(revoked_utc)
        .execute(&self.pool)
        .await
        .map_err(Self::unavailable)?;
        Ok(())
    }

    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries
                (id, tenant_id, actor, action, severity, resource, metadata, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.tenant_id)
        .bind(entry.actor)
        .bind(entry.action.as_str())
        .bind(entry.severity.as_str())
        .bind(&entry.resource)
        .bind(&entry.metadata)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await
        .map_err(Self::unavailable)?;
        Ok(())
    }

    async fn query_audit_entries(
        &self,
        filter: &AuditFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<AuditEntry>, u64), StoreError> {
        const WHERE_CLAUSE: &str = r#"
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR actor = $2)
              AND ($3::text IS NULL OR action = $3)
              AND ($4::text IS NULL OR severity = $4)
              AND ($5::timestamptz IS NULL OR created_utc >= $5)
              AND ($6::timestamptz IS NULL OR created_utc < $6)
              AND (NOT $7::bool
                   OR severity IN ('high', 'critical')
                   OR action IN ('login_failed', 'token_reuse_detected', 'access_denied'))
        "#;

        let action = filter.action.map(|a| a.as_str());
        let severity = filter.severity.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM audit_entries {}",
            WHERE_CLAUSE
        ))
        .bind(filter.tenant_id)
        .bind(filter.actor)
        .bind(action)
        .bind(severity)
        .bind(filter.from_utc)
        .bind(filter.to_utc)
        .bind(filter.security_only)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::unavailable)?;

        let offset = (page.saturating_sub(1) as i64) * page_size as i64;
        let entries = sqlx::query_as::<_, AuditEntry>(&format!(
            "SELECT * FROM audit_entries {} ORDER BY created_utc DESC LIMIT $8 OFFSET $9",
            WHERE_CLAUSE
        ))
        .bind(filter.tenant_id)
        .bind(filter.actor)
        .bind(action)
        .bind(severity)
        .bind(filter.from_utc)
        .bind(filter.to_utc)
        .bind(filter.security_only)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::unavailable)?;

        Ok((entries, total as u64))
    }

    async fn audit_severity_counts(
        &self,
        tenant_id: Uuid,
        from_utc: Option<DateTime<Utc>>,
        to_utc: Option<DateTime<Utc>>,
    ) -> Result<SeverityCounts, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT severity, COUNT(*)
            FROM audit_entries
            WHERE tenant_id = $1
              AND ($2::timestamptz IS NULL OR created_utc >= $2)
              AND ($3::timestamptz IS NULL OR created_utc < $3)
            GROUP BY severity
            "#,
        )
        .bind(tenant_id)
        .bind(from_utc)
        .bind(to_utc)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::unavailable)?;

        let mut counts = SeverityCounts::default();
        for (severity, count) in rows {
            match severity.parse::<Severity>() {
                Ok(severity) => counts.bump(severity, count as u64),
                Err(e) => tracing::error!(error = %e, "Unknown severity in audit store"),
            }
        }
        Ok(counts)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Self::unavailable)?;
        Ok(())
    }
}
