use serde::Deserialize;
use std::time::Duration;

fn default_rotate_timeout_seconds() -> u64 {
    10
}

/// Settings for the credential-service client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    /// Base URL of the credential service, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Upper bound on a credential rotation call. Past it the session is
    /// treated as expired rather than keeping queued requests waiting.
    #[serde(default = "default_rotate_timeout_seconds")]
    pub rotate_timeout_seconds: u64,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            rotate_timeout_seconds: default_rotate_timeout_seconds(),
        }
    }

    pub fn rotate_timeout(&self) -> Duration {
        Duration::from_secs(self.rotate_timeout_seconds)
    }
}
