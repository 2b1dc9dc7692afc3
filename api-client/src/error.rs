use thiserror::Error;

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session cannot be renewed. The caller must return the user to
    /// the login entry point. This is the single signal fanned out to
    /// every request queued behind a failed renewal.
    #[error("Session expired, re-authentication required")]
    SessionExpired,

    /// Network or server failure. Transient; the caller may retry.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status outside the
    /// credential renewal flow.
    #[error("Service error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
