//! Audit entry model - security and compliance logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Principal;

/// Audit action codes. Closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    LoginSuccess,
    LoginFailed,
    TokenRefreshed,
    TokenReuseDetected,
    AccessDenied,
    Logout,
    MfaChallengeSent,
    MfaVerified,
    MfaFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LoginSuccess => "login_success",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::TokenRefreshed => "token_refreshed",
            AuditAction::TokenReuseDetected => "token_reuse_detected",
            AuditAction::AccessDenied => "access_denied",
            AuditAction::Logout => "logout",
            AuditAction::MfaChallengeSent => "mfa_challenge_sent",
            AuditAction::MfaVerified => "mfa_verified",
            AuditAction::MfaFailed => "mfa_failed",
        }
    }

    /// Actions that qualify for the security view regardless of severity.
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            AuditAction::LoginFailed | AuditAction::TokenReuseDetected | AuditAction::AccessDenied
        )
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login_success" => Ok(AuditAction::LoginSuccess),
            "login_failed" => Ok(AuditAction::LoginFailed),
            "token_refreshed" => Ok(AuditAction::TokenRefreshed),
            "token_reuse_detected" => Ok(AuditAction::TokenReuseDetected),
            "access_denied" => Ok(AuditAction::AccessDenied),
            "logout" => Ok(AuditAction::Logout),
            "mfa_challenge_sent" => Ok(AuditAction::MfaChallengeSent),
            "mfa_verified" => Ok(AuditAction::MfaVerified),
            "mfa_failed" => Ok(AuditAction::MfaFailed),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

impl TryFrom<String> for AuditAction {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Severity classification for audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Severities that qualify for the security view on their own.
    pub fn is_security_relevant(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Immutable audit entry. Created once, never mutated.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Acting principal, or None for anonymous events (e.g. a failed
    /// login for an unknown email).
    pub actor: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    #[sqlx(try_from = "String")]
    pub severity: Severity,
    /// Resource/path context for the event, if any.
    pub resource: Option<String>,
    /// Free-form context: ip, user agent, device.
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        tenant_id: Uuid,
        actor: Option<Uuid>,
        action: AuditAction,
        severity: Severity,
        resource: Option<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            actor,
            action,
            severity,
            resource,
            metadata,
            created_utc: Utc::now(),
        }
    }

    /// Successful login for a principal.
    pub fn login_success(principal: &Principal, metadata: serde_json::Value) -> Self {
        Self::new(
            principal.tenant_id,
            Some(principal.id),
            AuditAction::LoginSuccess,
            Severity::Info,
            None,
            metadata,
        )
    }

    /// Failed login attempt. Actor is the matched principal id when the
    /// email resolved, None otherwise.
    pub fn login_failed(tenant_id: Uuid, actor: Option<Uuid>, metadata: serde_json::Value) -> Self {
        Self::new(
            tenant_id,
            actor,
            AuditAction::LoginFailed,
            Severity::Low,
            None,
            metadata,
        )
    }

    /// Successful rotation of a refresh credential.
    pub fn token_refreshed(principal: &Principal, metadata: serde_json::Value) -> Self {
        Self::new(
            principal.tenant_id,
            Some(principal.id),
            AuditAction::TokenRefreshed,
            Severity::Info,
            None,
            metadata,
        )
    }

    /// Retired refresh credential presented while the family was still
    /// active: the session has been revoked.
    pub fn token_reuse_detected(principal: &Principal, metadata: serde_json::Value) -> Self {
        Self::new(
            principal.tenant_id,
            Some(principal.id),
            AuditAction::TokenReuseDetected,
            Severity::Critical,
            None,
            metadata,
        )
    }

    /// Authenticated principal denied access to a resource by role.
    pub fn access_denied(principal: &Principal, resource: impl Into<String>) -> Self {
        Self::new(
            principal.tenant_id,
            Some(principal.id),
            AuditAction::AccessDenied,
            Severity::Medium,
            Some(resource.into()),
            serde_json::json!({ "role": principal.role }),
        )
    }

    /// Explicit logout.
    pub fn logout(principal: &Principal, metadata: serde_json::Value) -> Self {
        Self::new(
            principal.tenant_id,
            Some(principal.id),
            AuditAction::Logout,
            Severity::Info,
            None,
            metadata,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_action_codes_round_trip() {
        for action in [
            AuditAction::LoginSuccess,
            AuditAction::LoginFailed,
            AuditAction::TokenRefreshed,
            AuditAction::TokenReuseDetected,
            AuditAction::AccessDenied,
            AuditAction::Logout,
            AuditAction::MfaChallengeSent,
            AuditAction::MfaVerified,
            AuditAction::MfaFailed,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_severity_round_trip() {
        for severity in [
            Severity::Info,
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            assert_eq!(severity.as_str().parse::<Severity>().unwrap(), severity);
        }
    }

    #[test]
    fn test_reuse_event_is_critical() {
        let principal = Principal {
            id: Uuid::new_v4(),
            role: Role::Patient,
            tenant_id: Uuid::new_v4(),
        };
        let entry = AuditEntry::token_reuse_detected(&principal, serde_json::json!({}));

        assert_eq!(entry.severity, Severity::Critical);
        assert!(entry.severity.is_security_relevant());
        assert!(entry.action.is_security_relevant());
    }

    #[test]
    fn test_access_denied_carries_resource() {
        let principal = Principal {
            id: Uuid::new_v4(),
            role: Role::Staff,
            tenant_id: Uuid::new_v4(),
        };
        let entry = AuditEntry::access_denied(&principal, "/audit/entries");

        assert_eq!(entry.severity, Severity::Medium);
        assert_eq!(entry.resource.as_deref(), Some("/audit/entries"));
        assert_eq!(entry.actor, Some(principal.id));
    }
}
