//! Request/response DTOs for the sync API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use juris_db::models::{LegalCase, ProcessSync, SyncAudit};

/// Summary view of one sync attempt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncSummary {
    pub id: Uuid,
    pub case_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    pub request_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_request_id: Option<String>,
    /// Dataset counts recorded on completion, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ProcessSync> for SyncSummary {
    fn from(sync: &ProcessSync) -> Self {
        Self {
            id: sync.id,
            case_id: sync.case_id,
            status: sync.status.clone(),
            status_reason: sync.status_reason.clone(),
            request_type: sync.request_type.clone(),
            remote_request_id: sync.remote_request_id.clone(),
            counts: sync.metadata.get("counts").cloned(),
            completed_at: sync.completed_at,
            created_at: sync.created_at,
        }
    }
}

/// Case fields exposed alongside sync state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaseView {
    pub id: Uuid,
    pub process_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl From<&LegalCase> for CaseView {
    fn from(case: &LegalCase) -> Self {
        Self {
            id: case.id,
            process_number: case.process_number.clone(),
            tracking_id: case.tracking_id.clone(),
            hour_range: case.hour_range.clone(),
            last_sync_at: case.last_sync_at,
        }
    }
}

/// One audit trail event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEventView {
    pub id: Uuid,
    pub event_type: String,
    pub detail: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl From<&SyncAudit> for AuditEventView {
    fn from(audit: &SyncAudit) -> Self {
        Self {
            id: audit.id,
            event_type: audit.event_type.clone(),
            detail: audit.detail.clone(),
            created_at: audit.created_at,
        }
    }
}

/// Response for a manual sync trigger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TriggerSyncResponse {
    pub case: CaseView,
    pub sync: SyncSummary,
}

/// Current sync state of a case.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaseSyncStatusResponse {
    pub case: CaseView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_sync: Option<SyncSummary>,
    pub recent_events: Vec<AuditEventView>,
}

/// Acknowledgement returned to the provider for webhook deliveries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<Uuid>,
}

impl WebhookAck {
    pub fn ok(sync_id: Option<Uuid>) -> Self {
        Self {
            status: "ok".to_string(),
            sync_id,
        }
    }

    pub fn ignored() -> Self {
        Self {
            status: "ignored".to_string(),
            sync_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_surfaces_counts_from_metadata() {
        let sync = ProcessSync {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            credential_id: None,
            remote_request_id: Some("req-1".to_string()),
            request_type: "manual".to_string(),
            requested_by: None,
            request_payload: None,
            status: "completed".to_string(),
            status_reason: None,
            metadata: json!({"counts": {"parties": 2, "movements": 3}, "pages": 1}),
            completed_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let summary = SyncSummary::from(&sync);
        assert_eq!(summary.counts, Some(json!({"parties": 2, "movements": 3})));
        assert_eq!(summary.status, "completed");
    }

    #[test]
    fn absent_counts_are_omitted_from_json() {
        let sync = ProcessSync {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            credential_id: None,
            remote_request_id: None,
            request_type: "manual".to_string(),
            requested_by: None,
            request_payload: None,
            status: "pending".to_string(),
            status_reason: None,
            metadata: json!({}),
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(SyncSummary::from(&sync)).unwrap();
        assert!(value.get("counts").is_none());
        assert!(value.get("status_reason").is_none());
    }
}
