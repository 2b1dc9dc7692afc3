use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AuditEntry, Principal, RefreshFamily};
use crate::services::{AuditTrail, CredentialError, JwtSigner, TokenResponse};
use crate::store::CredentialStore;

/// Issues, rotates, verifies, and revokes credential pairs.
///
/// The issuer is the only writer of refresh-family state, and every
/// mutation goes through the store's atomic operations. A rotation that
/// loses the store-level compare-and-swap is handled as a reuse event:
/// a plain revoked flag cannot tell a stolen-token replay from a client
/// retry, so both revoke the family.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn CredentialStore>,
    jwt: JwtSigner,
    audit: AuditTrail,
    max_session_hours: i64,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        jwt: JwtSigner,
        audit: AuditTrail,
        max_session_hours: i64,
    ) -> Self {
        Self {
            store,
            jwt,
            audit,
            max_session_hours,
        }
    }

    /// Issue a fresh credential pair for an authenticated principal,
    /// opening a new refresh family at generation 0.
    pub async fn issue(
        &self,
        principal: Principal,
        metadata: serde_json::Value,
    ) -> Result<TokenResponse, CredentialError> {
        let refresh_id = Uuid::new_v4();
        let family_id = Uuid::new_v4();

        let refresh_token = self
            .jwt
            .sign_refresh(&principal, family_id, 0, refresh_id)?;

        let mut family = RefreshFamily::new(&principal, refresh_id, &refresh_token);
        family.family_id = family_id;

        self.store.insert_family(&family).await?;

        let access_token = self.jwt.sign_access(&principal)?;

        tracing::info!(
            principal_id = %principal.id,
            family_id = %family_id,
            "Session issued"
        );
        self.audit
            .record(AuditEntry::login_success(&principal, metadata))
            .await;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
            principal,
        })
    }

    /// Rotate a refresh credential, returning a fresh pair.
    ///
    /// Exactly one rotation can succeed per generation; concurrent
    /// attempts lose the store CAS and revoke the family, as does
    /// presenting any retired generation.
    pub async fn rotate(
        &self,
        refresh_token: &str,
        metadata: serde_json::Value,
    ) -> Result<TokenResponse, CredentialError> {
        let claims = self
            .jwt
            .verify_refresh(refresh_token)
            .map_err(|_| CredentialError::Invalid)?;

        let family = self
            .store
            .get_family(claims.fam)
            .await?
            .ok_or(CredentialError::Invalid)?;

        if family.is_revoked() {
            return Err(CredentialError::Invalid);
        }

        if family.is_exhausted(self.max_session_hours) {
            tracing::info!(family_id = %family.family_id, "Session past maximum lifetime");
            self.store.revoke_family(family.family_id, Utc::now()).await?;
            return Err(CredentialError::Invalid);
        }

        let principal = family.principal();

        if claims.gen < family.generation {
            return self.handle_reuse(&family, &principal, claims.gen, metadata).await;
        }

        if claims.gen > family.generation
            || claims.jti != family.current_refresh_id
            || family.refresh_token_hash != RefreshFamily::hash_token(refresh_token)
        {
            tracing::warn!(
                family_id = %family.family_id,
                "Refresh credential does not match family state"
            );
            return Err(CredentialError::Invalid);
        }

        let new_refresh_id = Uuid::new_v4();
        let new_refresh_token =
            self.jwt
                .sign_refresh(&principal, family.family_id, claims.gen + 1, new_refresh_id)?;
        let new_hash = RefreshFamily::hash_token(&new_refresh_token);

        let advanced = self
            .store
            .cas_advance_generation(
                family.family_id,
                claims.gen,
                new_refresh_id,
                &new_hash,
                Utc::now(),
            )
            .await?;

        if !advanced {
            // A concurrent rotation from the same generation already won.
            return self.handle_reuse(&family, &principal, claims.gen, metadata).await;
        }

        let access_token = self.jwt.sign_access(&principal)?;

        tracing::info!(
            principal_id = %principal.id,
            family_id = %family.family_id,
            generation = claims.gen + 1,
            "Credentials rotated"
        );
        self.audit
            .record(AuditEntry::token_refreshed(&principal, metadata))
            .await;

        Ok(TokenResponse {
            access_token,
            refresh_token: new_refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
            principal,
        })
    }

    /// Verify an access credential. Signature and expiry only.
    pub fn verify(&self, access_token: &str) -> Result<Principal, CredentialError> {
        Ok(self.jwt.verify_access(access_token)?.principal())
    }

    /// Revoke a refresh family. Idempotent.
    pub async fn revoke(&self, family_id: Uuid) -> Result<(), CredentialError> {
        self.store.revoke_family(family_id, Utc::now()).await?;
        tracing::info!(family_id = %family_id, "Session revoked");
        Ok(())
    }

    async fn handle_reuse(
        &self,
        family: &RefreshFamily,
        principal: &Principal,
        presented_generation: i64,
        metadata: serde_json::Value,
    ) -> Result<TokenResponse, CredentialError> {
        tracing::warn!(
            family_id = %family.family_id,
            principal_id = %principal.id,
            presented_generation,
            "Retired refresh credential presented; revoking family"
        );

        self.store.revoke_family(family.family_id, Utc::now()).await?;

        let mut metadata = metadata;
        if let Some(map) = metadata.as_object_mut() {
            map.insert(
                "family_id".to_string(),
                serde_json::Value::String(family.family_id.to_string()),
            );
            map.insert(
                "presented_generation".to_string(),
                serde_json::Value::from(presented_generation),
            );
        }
        self.audit
            .record(AuditEntry::token_reuse_detected(principal, metadata))
            .await;

        Err(CredentialError::CredentialReused)
    }
}
