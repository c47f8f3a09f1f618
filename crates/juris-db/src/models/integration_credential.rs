//! Integration credential model.
//!
//! Provider API credentials, tenant-scoped or global (`tenant_id IS NULL`).
//! Lookup order is handled by the credential resolver in juris-sync; this
//! model only exposes the individual finders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A provider API credential.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IntegrationCredential {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub provider: String,
    pub environment: String,
    pub base_url: String,
    pub api_key: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntegrationCredential {
    /// Register a credential. `tenant_id = None` makes it global.
    pub async fn create(
        pool: &PgPool,
        tenant_id: Option<Uuid>,
        provider: &str,
        environment: &str,
        base_url: &str,
        api_key: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO integration_credentials (
                tenant_id, provider, environment, base_url, api_key
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(provider)
        .bind(environment)
        .bind(base_url)
        .bind(api_key)
        .fetch_one(pool)
        .await
    }

    /// Active credential scoped to a tenant.
    pub async fn find_active_for_tenant(
        pool: &PgPool,
        provider: &str,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM integration_credentials
            WHERE provider = $1 AND tenant_id = $2 AND active
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(provider)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Active global credential.
    pub async fn find_active_global(
        pool: &PgPool,
        provider: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM integration_credentials
            WHERE provider = $1 AND tenant_id IS NULL AND active
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(provider)
        .fetch_optional(pool)
        .await
    }

    /// Most recently updated active credential regardless of scope.
    ///
    /// Legacy single-tenant fallback; callers must log when they use it.
    pub async fn find_most_recent_active(
        pool: &PgPool,
        provider: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM integration_credentials
            WHERE provider = $1 AND active
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(provider)
        .fetch_optional(pool)
        .await
    }

    /// Deactivate a credential.
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE integration_credentials
            SET active = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
