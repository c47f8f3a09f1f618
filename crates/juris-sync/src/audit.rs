//! Audit trail recorder.
//!
//! Thin append-only wrapper over [`SyncAudit`]. Every lifecycle transition
//! from the orchestrator and the reconciler goes through here with a
//! machine-parseable detail payload, sufficient to reconstruct the chain:
//! request submitted → polled N times → webhook(s) received → terminal
//! status.

use serde_json::{json, Value as JsonValue};
use sqlx::PgConnection;
use uuid::Uuid;

use juris_db::models::sync_audit::event_type;
use juris_db::models::{DatasetCounts, SyncAudit};

/// Identifiers an audit event is tied to.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditScope {
    pub case_id: Option<Uuid>,
    pub sync_id: Option<Uuid>,
    pub response_id: Option<Uuid>,
}

/// Append-only audit recorder.
pub struct AuditTrail;

impl AuditTrail {
    /// Record a provider request submission.
    pub async fn request_submitted(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: AuditScope,
        remote_request_id: &str,
    ) -> Result<(), sqlx::Error> {
        let detail = json!({ "request_id": remote_request_id });
        Self::append(conn, tenant_id, scope, event_type::REQUEST_SUBMITTED, &detail).await
    }

    /// Record a status observation or transition.
    pub async fn status_update(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: AuditScope,
        from: Option<&str>,
        to: &str,
        extra: Option<JsonValue>,
    ) -> Result<(), sqlx::Error> {
        let mut detail = json!({ "from": from, "to": to });
        if let (Some(obj), Some(JsonValue::Object(extra))) = (detail.as_object_mut(), extra) {
            obj.extend(extra);
        }
        Self::append(conn, tenant_id, scope, event_type::STATUS_UPDATE, &detail).await
    }

    /// Record receipt of a webhook delivery.
    pub async fn webhook_received(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: AuditScope,
        remote_request_id: Option<&str>,
        reported_status: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let detail = json!({
            "request_id": remote_request_id,
            "reported_status": reported_status,
        });
        Self::append(conn, tenant_id, scope, event_type::WEBHOOK_RECEIVED, &detail).await
    }

    /// Record a provider increment sub-event under its own type string.
    pub async fn increment(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: AuditScope,
        increment_type: &str,
        payload: &JsonValue,
    ) -> Result<(), sqlx::Error> {
        Self::append(conn, tenant_id, scope, increment_type, payload).await
    }

    /// Record successful completion with per-entity row counts.
    pub async fn completed(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: AuditScope,
        counts: &DatasetCounts,
    ) -> Result<(), sqlx::Error> {
        let detail = json!({
            "parties": counts.parties,
            "subjects": counts.subjects,
            "movements": counts.movements,
            "attachments": counts.attachments,
        });
        Self::append(conn, tenant_id, scope, event_type::SYNC_COMPLETED, &detail).await
    }

    /// Record a failed attempt with its reason.
    pub async fn failed(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: AuditScope,
        reason_code: &str,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        let detail = json!({ "reason": reason_code, "message": message });
        Self::append(conn, tenant_id, scope, event_type::SYNC_FAILED, &detail).await
    }

    async fn append(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: AuditScope,
        event_type: &str,
        detail: &JsonValue,
    ) -> Result<(), sqlx::Error> {
        SyncAudit::record(
            conn,
            tenant_id,
            scope.case_id,
            scope.sync_id,
            scope.response_id,
            event_type,
            detail,
        )
        .await?;
        Ok(())
    }
}
