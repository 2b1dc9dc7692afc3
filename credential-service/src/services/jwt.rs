use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Principal, Role};
use crate::services::CredentialError;

/// JWT signer for access and refresh credential pairs
#[derive(Clone)]
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Claims for access credentials (short-lived, stateless)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal ID)
    pub sub: Uuid,
    /// Principal role
    pub role: Role,
    /// Tenant ID
    pub tid: Uuid,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: Uuid,
}

impl AccessClaims {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.sub,
            role: self.role,
            tenant_id: self.tid,
        }
    }
}

/// Claims for refresh credentials (long-lived, single-use)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (principal ID)
    pub sub: Uuid,
    /// Refresh family this credential belongs to
    pub fam: Uuid,
    /// Rotation generation within the family
    pub gen: i64,
    /// Tenant ID
    pub tid: Uuid,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Credential ID (matches the family's current_refresh_id)
    pub jti: Uuid,
}

/// Credential pair returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub principal: Principal,
}

impl JwtSigner {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    /// Sign an access credential for a principal
    pub fn sign_access(&self, principal: &Principal) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessClaims {
            sub: principal.id,
            role: principal.role,
            tid: principal.tenant_id,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access credential: {}", e))
    }

    /// Sign a refresh credential bound to a family and generation
    pub fn sign_refresh(
        &self,
        principal: &Principal,
        family_id: Uuid,
        generation: i64,
        refresh_id: Uuid,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(self.refresh_token_expiry_days);

        let claims = RefreshClaims {
            sub: principal.id,
            fam: family_id,
            gen: generation,
            tid: principal.tenant_id,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: refresh_id,
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh credential: {}", e))
    }

    /// Verify an access credential. Signature and expiry only; no store
    /// lookup. Expiry exactly equal to the current time counts as expired.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, CredentialError> {
        let claims = self.decode::<AccessClaims>(token)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(CredentialError::Expired);
        }
        Ok(claims)
    }

    /// Verify a refresh credential's signature and expiry. Family state
    /// is the issuer's concern.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, CredentialError> {
        let claims = self.decode::<RefreshClaims>(token)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(CredentialError::Expired);
        }
        Ok(claims)
    }

    fn decode<C: serde::de::DeserializeOwned>(&self, token: &str) -> Result<C, CredentialError> {
        // The expiry boundary (exp <= now is expired, with zero leeway) is
        // enforced explicitly above, so the library check stays off.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        decode::<C>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| CredentialError::Invalid)
    }

    /// Access credential lifetime in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(access_minutes: i64) -> JwtConfig {
        JwtConfig {
            secret: "test-secret-0123456789-0123456789".to_string(),
            access_token_expiry_minutes: access_minutes,
            refresh_token_expiry_days: 7,
            max_session_hours: 720,
        }
    }

    fn principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role: Role::Doctor,
            tenant_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_access_credential_round_trip() {
        let signer = JwtSigner::new(&test_config(15));
        let principal = principal();

        let token = signer.sign_access(&principal).unwrap();
        let claims = signer.verify_access(&token).unwrap();

        assert_eq!(claims.principal(), principal);
    }

    #[test]
    fn test_refresh_credential_round_trip() {
        let signer = JwtSigner::new(&test_config(15));
        let principal = principal();
        let family_id = Uuid::new_v4();
        let refresh_id = Uuid::new_v4();

        let token = signer
            .sign_refresh(&principal, family_id, 3, refresh_id)
            .unwrap();
        let claims = signer.verify_refresh(&token).unwrap();

        assert_eq!(claims.sub, principal.id);
        assert_eq!(claims.fam, family_id);
        assert_eq!(claims.gen, 3);
        assert_eq!(claims.jti, refresh_id);
    }

    #[test]
    fn test_expiry_boundary_is_expired() {
        // Zero-minute lifetime: exp == iat == now, which must be rejected
        let signer = JwtSigner::new(&test_config(0));
        let token = signer.sign_access(&principal()).unwrap();

        assert!(matches!(
            signer.verify_access(&token),
            Err(CredentialError::Expired)
        ));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let signer = JwtSigner::new(&test_config(15));
        let mut other_config = test_config(15);
        other_config.secret = "another-secret-entirely-0123456789".to_string();
        let other = JwtSigner::new(&other_config);

        let token = signer.sign_access(&principal()).unwrap();

        assert!(matches!(
            other.verify_access(&token),
            Err(CredentialError::Invalid)
        ));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let signer = JwtSigner::new(&test_config(15));

        assert!(matches!(
            signer.verify_access("not-a-jwt"),
            Err(CredentialError::Invalid)
        ));
    }
}
