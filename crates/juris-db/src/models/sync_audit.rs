//! Sync audit model.
//!
//! Append-only event log tied to a case / sync record / response triple.
//! This is the ground truth for reconstructing what happened to a sync,
//! independent of the mutable sync record state. Never updated or deleted
//! by this subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Well-known audit event types.
///
/// Provider-defined increment events are recorded with the provider's own
/// type string and are not enumerated here.
pub mod event_type {
    pub const REQUEST_SUBMITTED: &str = "request_submitted";
    pub const STATUS_UPDATE: &str = "status_update";
    pub const WEBHOOK_RECEIVED: &str = "webhook_received";
    pub const SYNC_COMPLETED: &str = "sync_completed";
    pub const SYNC_FAILED: &str = "sync_failed";
}

/// An immutable lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyncAudit {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub case_id: Option<Uuid>,
    pub sync_id: Option<Uuid>,
    pub response_id: Option<Uuid>,
    pub event_type: String,
    pub detail: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl SyncAudit {
    /// Append an event on the caller's connection.
    pub async fn record(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        case_id: Option<Uuid>,
        sync_id: Option<Uuid>,
        response_id: Option<Uuid>,
        event_type: &str,
        detail: &JsonValue,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO sync_audits (
                tenant_id, case_id, sync_id, response_id, event_type, detail
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(case_id)
        .bind(sync_id)
        .bind(response_id)
        .bind(event_type)
        .bind(detail)
        .fetch_one(conn)
        .await
    }

    /// List events for a sync record, oldest first.
    pub async fn list_for_sync(
        pool: &PgPool,
        tenant_id: Uuid,
        sync_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM sync_audits
            WHERE tenant_id = $1 AND sync_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(sync_id)
        .fetch_all(pool)
        .await
    }

    /// List events for a case, newest first.
    pub async fn list_for_case(
        pool: &PgPool,
        tenant_id: Uuid,
        case_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM sync_audits
            WHERE tenant_id = $1 AND case_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(case_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
