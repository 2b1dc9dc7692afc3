//! Wire transport to the credential service.
//!
//! The session endpoints are behind a trait so the coordinator can be
//! exercised without a network.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ClientSettings;

/// Principal shape returned alongside a credential pair.
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalInfo {
    pub id: Uuid,
    pub role: String,
    pub tenant_id: Uuid,
}

/// Canonical credential grant: one access credential, one refresh
/// credential, and the principal they were issued for.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub principal: PrincipalInfo,
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The service rejected the credential outright. Not recoverable by
    /// retrying; the session is over.
    #[error("credential rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Network failure or server-side error. Transient.
    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn login(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<TokenGrant, TransportError>;

    async fn rotate(&self, refresh_token: &str) -> Result<TokenGrant, TransportError>;

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), TransportError>;
}

/// HTTP transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(settings: &ClientSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn grant_from(response: reqwest::Response) -> Result<TokenGrant, TransportError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenGrant>()
                .await
                .map_err(|e| TransportError::Transport(format!("malformed grant: {}", e)));
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(TransportError::Transport(format!(
                "credential service returned {}",
                status
            )))
        }
    }
}

#[async_trait]
impl SessionTransport for HttpTransport {
    async fn login(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<TokenGrant, TransportError> {
        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&serde_json::json!({
                "tenant_id": tenant_id,
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?;

        Self::grant_from(response).await
    }

    async fn rotate(&self, refresh_token: &str) -> Result<TokenGrant, TransportError> {
        let response = self
            .client
            .post(format!("{}/auth/refresh", self.base_url))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?;

        Self::grant_from(response).await
    }

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/auth/logout", self.base_url))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            Err(TransportError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        } else {
            Err(TransportError::Transport(format!(
                "credential service returned {}",
                status
            )))
        }
    }
}
