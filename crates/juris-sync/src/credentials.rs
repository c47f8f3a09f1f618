//! Per-tenant provider credential resolution.
//!
//! Resolution order: active credential scoped to the tenant, then an
//! active global credential, then — only when the legacy fallback flag is
//! enabled — the most recently updated active credential regardless of
//! scope. The fallback exists for installations migrated from the
//! single-tenant era; using it is logged so silent cross-tenant credential
//! use stays observable.

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use juris_db::models::IntegrationCredential;

use crate::error::{SyncError, SyncResult};

/// A usable provider credential.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub credential_id: Uuid,
    pub base_url: String,
    pub api_key: String,
}

impl From<IntegrationCredential> for ResolvedCredential {
    fn from(c: IntegrationCredential) -> Self {
        Self {
            credential_id: c.id,
            base_url: c.base_url,
            api_key: c.api_key,
        }
    }
}

/// Resolves the active provider credential for a tenant.
#[derive(Clone)]
pub struct CredentialResolver {
    pool: PgPool,
    provider: String,
    legacy_fallback: bool,
}

impl CredentialResolver {
    /// Create a resolver for a provider name.
    #[must_use]
    pub fn new(pool: PgPool, provider: impl Into<String>) -> Self {
        Self {
            pool,
            provider: provider.into(),
            legacy_fallback: false,
        }
    }

    /// Enable the legacy any-scope fallback.
    #[must_use]
    pub fn with_legacy_fallback(mut self, enabled: bool) -> Self {
        self.legacy_fallback = enabled;
        self
    }

    /// Resolve the credential to use for a tenant.
    ///
    /// Fails closed with [`SyncError::NotConfigured`] when nothing is
    /// found and the fallback is disabled.
    pub async fn resolve(&self, tenant_id: Uuid) -> SyncResult<ResolvedCredential> {
        if let Some(c) =
            IntegrationCredential::find_active_for_tenant(&self.pool, &self.provider, tenant_id)
                .await?
        {
            return Ok(c.into());
        }

        if let Some(c) =
            IntegrationCredential::find_active_global(&self.pool, &self.provider).await?
        {
            return Ok(c.into());
        }

        if self.legacy_fallback {
            if let Some(c) =
                IntegrationCredential::find_most_recent_active(&self.pool, &self.provider).await?
            {
                warn!(
                    %tenant_id,
                    credential_id = %c.id,
                    credential_tenant = ?c.tenant_id,
                    "Using legacy credential fallback: credential is scoped to another tenant"
                );
                return Ok(c.into());
            }
        }

        Err(SyncError::NotConfigured)
    }
}
