use service_core::error::AppError;
use thiserror::Error;

use crate::store::StoreError;

/// Credential lifecycle failures.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Access credential past expiry. Recoverable by rotating the
    /// refresh credential.
    #[error("Access credential expired")]
    Expired,

    /// Malformed, unsigned, or unknown credential. Not recoverable;
    /// the caller must re-authenticate.
    #[error("Invalid credential")]
    Invalid,

    /// A retired refresh credential was presented for a family that was
    /// still active. The family has been revoked.
    #[error("Refresh credential reuse detected")]
    CredentialReused,

    /// Authenticated but the principal's role is not in the required set.
    #[error("Insufficient role")]
    RoleDenied,

    /// Transient store failure. Not a security event.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Expired => {
                AppError::AuthError(anyhow::anyhow!("Access credential expired"))
            }
            CredentialError::Invalid => {
                AppError::AuthError(anyhow::anyhow!("Invalid credential"))
            }
            CredentialError::CredentialReused => AppError::AuthError(anyhow::anyhow!(
                "Session revoked, re-authentication required"
            )),
            CredentialError::RoleDenied => {
                AppError::Forbidden(anyhow::anyhow!("Insufficient role for this resource"))
            }
            CredentialError::StoreUnavailable(_) => AppError::ServiceUnavailable,
            CredentialError::Internal(e) => AppError::InternalError(e),
        }
    }
}
