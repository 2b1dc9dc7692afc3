pub mod audit_entry;
pub mod principal;
pub mod refresh_family;
pub mod user;

pub use audit_entry::{AuditAction, AuditEntry, Severity};
pub use principal::{Principal, Role};
pub use refresh_family::RefreshFamily;
pub use user::User;
