//! Legal case model.
//!
//! A locally tracked legal process, identified externally by its CNJ-like
//! process number and tenant-scoped. Owns the sync records and the derived
//! normalized dataset, and carries the provider-side tracking handle used
//! to renew watches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// A tracked legal process.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LegalCase {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub process_number: String,
    pub tracking_id: Option<String>,
    pub hour_range: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LegalCase {
    /// Register a new case for a tenant.
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        process_number: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO legal_cases (tenant_id, process_number)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(process_number)
        .fetch_one(pool)
        .await
    }

    /// Find a case by ID within a tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM legal_cases
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Find a case by its process number, across all tenants.
    ///
    /// Webhooks are not tenant-authenticated, so the reconciler resolves
    /// the owning tenant from the case itself.
    pub async fn find_by_process_number(
        conn: &mut PgConnection,
        process_number: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM legal_cases
            WHERE process_number = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(process_number)
        .fetch_optional(conn)
        .await
    }

    /// Find a case by its provider tracking id.
    pub async fn find_by_tracking_id(
        conn: &mut PgConnection,
        tracking_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM legal_cases
            WHERE tracking_id = $1
            LIMIT 1
            "#,
        )
        .bind(tracking_id)
        .fetch_optional(conn)
        .await
    }

    /// Opportunistically update the tracking handle.
    ///
    /// COALESCE semantics: existing values are only overwritten when the
    /// caller supplies a replacement, so a sparse webhook payload never
    /// erases a known handle.
    pub async fn update_tracking(
        conn: &mut PgConnection,
        id: Uuid,
        tracking_id: Option<&str>,
        hour_range: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE legal_cases
            SET tracking_id = COALESCE($2, tracking_id),
                hour_range = COALESCE($3, hour_range),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(tracking_id)
        .bind(hour_range)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Persist a freshly created tracking handle.
    pub async fn set_tracking(
        pool: &PgPool,
        id: Uuid,
        tracking_id: &str,
        hour_range: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE legal_cases
            SET tracking_id = $2, hour_range = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(tracking_id)
        .bind(hour_range)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Stamp the denormalized last-sync timestamp.
    ///
    /// Runs on the caller's connection so it joins the dataset-replacement
    /// transaction.
    pub async fn touch_last_sync(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE legal_cases
            SET last_sync_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }
}
