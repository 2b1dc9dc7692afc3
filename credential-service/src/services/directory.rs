//! Directory lookup for login.
//!
//! User management is owned by the clinic CRUD services; this service
//! only needs lookup-by-email to verify a password.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::User;
use crate::store::StoreError;

#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_by_email(&self, tenant_id: Uuid, email: &str)
        -> Result<Option<User>, StoreError>;
}

#[derive(Clone)]
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PostgresDirectory {
    async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND LOWER(email) = LOWER($2)",
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(anyhow::Error::new(e)))
    }
}

/// In-memory directory for tests and local development.
#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<Vec<User>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.users.lock() {
            users.push(user);
        }
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let users = self
            .users
            .lock()
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!("user mutex poisoned: {}", e)))?;
        Ok(users
            .iter()
            .find(|u| u.tenant_id == tenant_id && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}
