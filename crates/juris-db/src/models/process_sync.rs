//! Process sync model.
//!
//! One row per sync attempt against the provider, whether triggered
//! manually, by the scheduler, or created on the fly for an unmatched
//! webhook. The row is the single source of truth for the attempt's
//! lifecycle; both the orchestrator and the webhook reconciler write to it
//! through targeted column-level updates so concurrent writers cannot
//! clobber each other's unrelated fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use std::fmt;
use uuid::Uuid;

/// How a sync attempt was initiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncRequestType {
    /// Explicit user action.
    #[default]
    Manual,
    /// Periodic scheduler tick.
    Cron,
    /// Created by the reconciler for an inbound webhook.
    Webhook,
    /// Internal maintenance (e.g. tracking renewal).
    System,
}

impl fmt::Display for SyncRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Cron => write!(f, "cron"),
            Self::Webhook => write!(f, "webhook"),
            Self::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for SyncRequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "cron" => Ok(Self::Cron),
            "webhook" => Ok(Self::Webhook),
            "system" => Ok(Self::System),
            _ => Err(format!("Unknown sync request type: {s}")),
        }
    }
}

/// Lifecycle status of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Created, no provider request submitted yet.
    Pending,
    /// Provider request submitted, awaiting results.
    Processing,
    /// Results normalized and persisted.
    Completed,
    /// Attempt failed; reason in `status_reason`.
    Failed,
    /// Cancelled on the provider side.
    Cancelled,
}

impl SyncStatus {
    /// Check if this status is terminal (the attempt has ended).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown sync status: {s}")),
        }
    }
}

/// Input for creating a sync record.
#[derive(Debug, Clone)]
pub struct CreateProcessSync {
    pub case_id: Uuid,
    pub credential_id: Option<Uuid>,
    pub request_type: SyncRequestType,
    pub requested_by: Option<Uuid>,
    pub request_payload: Option<JsonValue>,
}

/// One sync attempt for a case.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessSync {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub case_id: Uuid,
    pub credential_id: Option<Uuid>,
    pub remote_request_id: Option<String>,
    pub request_type: String,
    pub requested_by: Option<Uuid>,
    pub request_payload: Option<JsonValue>,
    pub status: String,
    pub status_reason: Option<String>,
    pub metadata: JsonValue,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessSync {
    /// Get the status enum.
    pub fn status(&self) -> SyncStatus {
        self.status.parse().unwrap_or(SyncStatus::Pending)
    }

    /// Get the request type enum.
    pub fn request_type(&self) -> SyncRequestType {
        self.request_type.parse().unwrap_or_default()
    }

    /// Create a new sync record in `pending`.
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        input: &CreateProcessSync,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO process_syncs (
                tenant_id, case_id, credential_id, request_type,
                requested_by, request_payload, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(input.case_id)
        .bind(input.credential_id)
        .bind(input.request_type.to_string())
        .bind(input.requested_by)
        .bind(&input.request_payload)
        .fetch_one(pool)
        .await
    }

    /// Find a sync record by ID within a tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM process_syncs
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Latest sync record for a case.
    pub async fn find_latest_for_case(
        pool: &PgPool,
        tenant_id: Uuid,
        case_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM process_syncs
            WHERE tenant_id = $1 AND case_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(case_id)
        .fetch_optional(pool)
        .await
    }

    /// Find a sync record by the provider's request id.
    pub async fn find_by_remote_request_id(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        remote_request_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM process_syncs
            WHERE tenant_id = $1 AND remote_request_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(remote_request_id)
        .fetch_optional(conn)
        .await
    }

    /// Find the sync record for a provider request id, creating a
    /// webhook-originated record if none exists.
    ///
    /// Webhook delivery can outlive or precede the orchestrator's wait
    /// loop, so an unknown request id is a new record, not an error.
    pub async fn find_or_create_for_request(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        case_id: Uuid,
        remote_request_id: &str,
    ) -> Result<Self, sqlx::Error> {
        if let Some(existing) =
            Self::find_by_remote_request_id(&mut *conn, tenant_id, remote_request_id).await?
        {
            return Ok(existing);
        }

        // The partial unique index on webhook rows makes this insert safe
        // against a concurrent delivery for the same request id; the loser
        // of the race re-reads the winner's row.
        let inserted: Option<Self> = sqlx::query_as(
            r#"
            INSERT INTO process_syncs (
                tenant_id, case_id, remote_request_id, request_type, status
            )
            VALUES ($1, $2, $3, 'webhook', 'processing')
            ON CONFLICT (tenant_id, remote_request_id) WHERE request_type = 'webhook'
            DO NOTHING
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(case_id)
        .bind(remote_request_id)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(row) = inserted {
            return Ok(row);
        }
        Self::find_by_remote_request_id(conn, tenant_id, remote_request_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Move a pending record to `processing` and persist the provider's
    /// request id.
    pub async fn mark_processing(
        pool: &PgPool,
        id: Uuid,
        remote_request_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE process_syncs
            SET status = 'processing',
                remote_request_id = $2,
                updated_at = NOW()
            WHERE id = $1
              AND status NOT IN ('completed', 'failed', 'cancelled')
            "#,
        )
        .bind(id)
        .bind(remote_request_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Advance a pending record to `processing` without touching the
    /// remote request id. Returns whether the transition was applied.
    pub async fn advance_to_processing(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE process_syncs
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a record to a terminal status.
    ///
    /// Forward-only: a record that already reached a terminal status is
    /// left untouched, so a late webhook cannot regress `completed`.
    /// Returns whether the transition was applied.
    pub async fn mark_terminal(
        conn: &mut PgConnection,
        id: Uuid,
        status: SyncStatus,
        reason: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        debug_assert!(status.is_terminal());
        let result = sqlx::query(
            r#"
            UPDATE process_syncs
            SET status = $2,
                status_reason = COALESCE($3, status_reason),
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
              AND status NOT IN ('completed', 'failed', 'cancelled')
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(reason)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pool variant of [`Self::mark_terminal`] for the failure path, which
    /// must be observable even when the attempt's transaction rolled back.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::mark_terminal(&mut conn, id, SyncStatus::Failed, Some(reason)).await
    }

    /// Merge partial progress into the record's metadata.
    ///
    /// `jsonb_strip_nulls` keeps a sparse webhook from overwriting
    /// previously-known fields with null.
    pub async fn merge_metadata(
        conn: &mut PgConnection,
        id: Uuid,
        patch: &JsonValue,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE process_syncs
            SET metadata = metadata || jsonb_strip_nulls($2),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Count sync attempts started by a tenant since a cutoff.
    ///
    /// Quota usage for the current period; webhook-originated records are
    /// excluded because they consume no provider request.
    pub async fn count_started_since(
        pool: &PgPool,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM process_syncs
            WHERE tenant_id = $1
              AND created_at >= $2
              AND request_type <> 'webhook'
            "#,
        )
        .bind(tenant_id)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in [
            SyncStatus::Pending,
            SyncStatus::Processing,
            SyncStatus::Completed,
            SyncStatus::Failed,
            SyncStatus::Cancelled,
        ] {
            assert_eq!(s.to_string().parse::<SyncStatus>().unwrap(), s);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SyncStatus::Pending.is_terminal());
        assert!(!SyncStatus::Processing.is_terminal());
        assert!(SyncStatus::Completed.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert!(SyncStatus::Cancelled.is_terminal());
    }

    #[test]
    fn request_type_round_trip() {
        for t in [
            SyncRequestType::Manual,
            SyncRequestType::Cron,
            SyncRequestType::Webhook,
            SyncRequestType::System,
        ] {
            assert_eq!(t.to_string().parse::<SyncRequestType>().unwrap(), t);
        }
    }
}
