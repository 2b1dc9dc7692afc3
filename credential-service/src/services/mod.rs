//! Services layer for the credential service.
//!
//! Token issuance/rotation, authorization support, and the audit trail
//! engine live here; handlers stay thin.

pub mod audit_trail;
pub mod directory;
pub mod error;
mod jwt;
mod token_issuer;

pub use audit_trail::AuditTrail;
pub use directory::{Directory, MemoryDirectory, PostgresDirectory};
pub use error::CredentialError;
pub use jwt::{AccessClaims, JwtSigner, RefreshClaims, TokenResponse};
pub use token_issuer::TokenIssuer;
