//! Authenticated HTTP client with transparent credential renewal.

use reqwest::{Method, StatusCode};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::ClientSettings;
use crate::coordinator::RefreshCoordinator;
use crate::error::ClientError;
use crate::transport::{HttpTransport, PrincipalInfo, SessionTransport, TransportError};

/// API client for clinic front-ends.
///
/// Every request carries the current access credential. A 401 response
/// triggers a coordinated renewal and exactly one replay; a request that
/// fails again after the replay is surfaced as-is.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    transport: Arc<dyn SessionTransport>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings) -> Self {
        let transport: Arc<dyn SessionTransport> = Arc::new(HttpTransport::new(settings));
        Self::with_transport(settings, transport)
    }

    /// Build against a custom transport (used by tests).
    pub fn with_transport(settings: &ClientSettings, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            coordinator: RefreshCoordinator::new(transport.clone(), settings.rotate_timeout()),
            transport,
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Log in and install the granted credential pair.
    pub async fn sign_in(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<PrincipalInfo, ClientError> {
        match self.transport.login(tenant_id, email, password).await {
            Ok(grant) => {
                self.coordinator.install(&grant).await;
                tracing::info!(principal_id = %grant.principal.id, "Signed in");
                Ok(grant.principal)
            }
            Err(TransportError::Rejected { status, message }) => {
                Err(ClientError::Api { status, message })
            }
            Err(TransportError::Transport(msg)) => Err(ClientError::Transport(msg)),
        }
    }

    /// Revoke the session server-side and drop local credential state.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let result = match self.coordinator.session().await {
            Some(tokens) => {
                match self
                    .transport
                    .logout(&tokens.access_token, &tokens.refresh_token)
                    .await
                {
                    // A rejected logout means the session was already gone
                    Ok(()) | Err(TransportError::Rejected { .. }) => Ok(()),
                    Err(TransportError::Transport(msg)) => Err(ClientError::Transport(msg)),
                }
            }
            None => Ok(()),
        };

        self.coordinator.clear().await;
        result
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ClientError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        self.send(Method::DELETE, path, None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let (access_token, epoch) = self.coordinator.current().await?;

        let response = self
            .execute(method.clone(), path, body.as_ref(), &access_token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // Renew once and replay once; a second 401 is surfaced as-is
        let access_token = self.coordinator.renew(epoch).await?;
        let response = self
            .execute(method, path, body.as_ref(), &access_token)
            .await?;
        Ok(response)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        access_token: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}
