pub mod authorize;

pub use authorize::{authorize_middleware, AuthPrincipal, RoleGuard};
