//! service-core: Shared infrastructure for the clinic platform services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
