//! Process response model.
//!
//! One immutable row per inbound delivery from the provider, whether a
//! polled result or a webhook payload. Recorded verbatim before any
//! interpretation so the full exchange can be replayed forensically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use std::fmt;
use uuid::Uuid;

/// Channel a delivery arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Fetched by the orchestrator's poll loop.
    Poll,
    /// Pushed by the provider.
    Webhook,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poll => write!(f, "poll"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

/// A raw inbound delivery.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessResponse {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub case_id: Option<Uuid>,
    pub sync_id: Option<Uuid>,
    pub source: String,
    pub delivery_id: Option<String>,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
}

impl ProcessResponse {
    /// Record a delivery on the caller's connection.
    ///
    /// `tenant_id`, `case_id` and `sync_id` are nullable: a webhook may
    /// arrive before any sync record exists, or for a case no tenant
    /// manages anymore — the delivery is still preserved.
    pub async fn record(
        conn: &mut PgConnection,
        tenant_id: Option<Uuid>,
        case_id: Option<Uuid>,
        sync_id: Option<Uuid>,
        source: ResponseSource,
        delivery_id: Option<&str>,
        payload: &JsonValue,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO process_responses (
                tenant_id, case_id, sync_id, source, delivery_id, payload
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(case_id)
        .bind(sync_id)
        .bind(source.to_string())
        .bind(delivery_id)
        .bind(payload)
        .fetch_one(conn)
        .await
    }

    /// List deliveries attached to a sync record, oldest first.
    pub async fn list_by_sync(
        pool: &PgPool,
        tenant_id: Uuid,
        sync_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM process_responses
            WHERE tenant_id = $1 AND sync_id = $2
            ORDER BY received_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(sync_id)
        .fetch_all(pool)
        .await
    }
}
