//! Tenant plan model.
//!
//! Per-tenant sync entitlements. `legacy_query_count` carries usage
//! imported from the pre-migration counter system and is added to the
//! current period's computed usage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Sync entitlements for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantPlan {
    pub tenant_id: Uuid,
    pub sync_enabled: bool,
    pub sync_quota: i32,
    pub legacy_query_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantPlan {
    /// Plan for a tenant, if configured.
    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM tenant_plans
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Upsert a tenant's entitlements.
    pub async fn upsert(
        pool: &PgPool,
        tenant_id: Uuid,
        sync_enabled: bool,
        sync_quota: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO tenant_plans (tenant_id, sync_enabled, sync_quota)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id) DO UPDATE
            SET sync_enabled = $2, sync_quota = $3, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(sync_enabled)
        .bind(sync_quota)
        .fetch_one(pool)
        .await
    }
}
