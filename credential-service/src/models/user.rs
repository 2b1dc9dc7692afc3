//! Directory record for login credential checks.
//!
//! Patient/staff management itself lives in the clinic CRUD services;
//! this service only ever reads users to verify a password at login.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Principal, Role};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub disabled: bool,
    pub created_utc: DateTime<Utc>,
}

impl User {
    pub fn new(
        tenant_id: Uuid,
        email: String,
        password_hash: String,
        display_name: Option<String>,
        role: Role,
    ) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            tenant_id,
            email,
            password_hash,
            display_name,
            role,
            disabled: false,
            created_utc: Utc::now(),
        }
    }

    /// The principal this user authenticates as.
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.user_id,
            role: self.role,
            tenant_id: self.tenant_id,
        }
    }
}
