//! Client library for the clinic platform credential service.
//!
//! Wraps an HTTP client with session credential handling: every request
//! carries the current access credential; an expired credential is
//! renewed through a single-flight refresh coordinator and the request
//! replayed exactly once.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use config::ClientSettings;
pub use coordinator::{RefreshCoordinator, SessionTokens};
pub use error::ClientError;
pub use transport::{HttpTransport, PrincipalInfo, SessionTransport, TokenGrant, TransportError};
