//! Refresh family model - one continuous login session.
//!
//! A family tracks the single currently-valid refresh credential through
//! its rotation generations. Presenting a retired generation while a later
//! one is still valid is treated as theft and revokes the whole family.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Principal, Role};

/// Refresh session family entity.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RefreshFamily {
    pub family_id: Uuid,

    /// Principal this session belongs to.
    pub principal_id: Uuid,

    pub tenant_id: Uuid,

    /// Role captured at issuance; rotation re-mints access credentials
    /// from the family without a directory lookup.
    #[sqlx(try_from = "String")]
    pub role: Role,

    /// Rotation generation. Advances by exactly one per successful
    /// rotation, only ever through a conditional store write.
    pub generation: i64,

    /// Identifier (jti) of the currently valid refresh credential.
    pub current_refresh_id: Uuid,

    /// SHA-256 hash of the currently valid refresh credential.
    pub refresh_token_hash: String,

    pub created_utc: DateTime<Utc>,
    pub rotated_utc: DateTime<Utc>,
    pub revoked_utc: Option<DateTime<Utc>>,
}

impl RefreshFamily {
    /// Create a new family at generation 0.
    pub fn new(principal: &Principal, refresh_id: Uuid, refresh_token: &str) -> Self {
        let now = Utc::now();
        Self {
            family_id: Uuid::new_v4(),
            principal_id: principal.id,
            tenant_id: principal.tenant_id,
            role: principal.role,
            generation: 0,
            current_refresh_id: refresh_id,
            refresh_token_hash: Self::hash_token(refresh_token),
            created_utc: now,
            rotated_utc: now,
            revoked_utc: None,
        }
    }

    /// Hash a refresh credential using SHA-256.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check if this family has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }

    /// Check if this family is past the maximum absolute session lifetime.
    pub fn is_exhausted(&self, max_session_hours: i64) -> bool {
        Utc::now() >= self.created_utc + Duration::hours(max_session_hours)
    }

    /// The principal this family was issued for.
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.principal_id,
            role: self.role,
            tenant_id: self.tenant_id,
        }
    }
}
