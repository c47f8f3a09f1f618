//! Webhook reconciler.
//!
//! Ingests asynchronous provider callbacks. Runs independently of — and
//! racing with — the orchestrator's poll loop against the same sync
//! records, so every write is a targeted, idempotent, keyed update and
//! terminal statuses are never regressed.
//!
//! The reconciler never touches the derived case dataset; only the
//! orchestrator's completion path invokes the normalizer.

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use juris_db::models::{
    LegalCase, ProcessResponse, ProcessSync, ResponseSource, SyncStatus,
};

use crate::audit::{AuditScope, AuditTrail};
use crate::error::SyncResult;

/// Inbound webhook payload.
///
/// The provider has shipped the request reference as `request_id`, as a
/// `request` object and as a `request_info` object over time; all three
/// are accepted. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub process_number: Option<String>,
    #[serde(default)]
    pub hour_range: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub event_status: Option<String>,
    #[serde(default)]
    pub request: Option<JsonValue>,
    #[serde(default)]
    pub request_info: Option<JsonValue>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub delivery_id: Option<String>,
    #[serde(default)]
    pub increments: Vec<JsonValue>,
}

fn id_from_object(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Object(map) => ["request_id", "id"].iter().find_map(|k| {
            map.get(*k)
                .and_then(JsonValue::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }),
        _ => None,
    }
}

impl WebhookPayload {
    /// The provider request this delivery refers to, under any of the
    /// historical shapes.
    #[must_use]
    pub fn remote_request_id(&self) -> Option<String> {
        if let Some(id) = self.request_id.clone().filter(|s| !s.is_empty()) {
            return Some(id);
        }
        self.request
            .as_ref()
            .and_then(id_from_object)
            .or_else(|| self.request_info.as_ref().and_then(id_from_object))
    }

    /// The status the delivery reports, if any.
    #[must_use]
    pub fn reported_status(&self) -> Option<&str> {
        self.status
            .as_deref()
            .or(self.event_status.as_deref())
            .or_else(|| {
                self.request_info
                    .as_ref()
                    .and_then(|r| r.get("status"))
                    .and_then(JsonValue::as_str)
            })
            .filter(|s| !s.is_empty())
    }

    /// Reported status mapped onto the local lifecycle, tolerating the
    /// provider's `started` alias.
    #[must_use]
    pub fn reported_sync_status(&self) -> Option<SyncStatus> {
        match self.reported_status()? {
            "started" | "processing" => Some(SyncStatus::Processing),
            other => other.parse().ok(),
        }
    }
}

/// Result of ingesting one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The delivery matched a local case and was applied.
    Processed {
        case_id: Uuid,
        sync_id: Option<Uuid>,
        status_changed: bool,
    },
    /// No local case matched; acknowledged so the provider stops
    /// retrying, the raw delivery kept for forensics.
    Ignored,
}

/// Ingests provider webhook deliveries.
#[derive(Clone)]
pub struct WebhookReconciler {
    pool: PgPool,
}

impl WebhookReconciler {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply one delivery. All writes happen in a single transaction and
    /// every update targets keyed rows, so replaying the same delivery is
    /// safe.
    #[instrument(skip_all, fields(delivery_id = ?payload.delivery_id))]
    pub async fn ingest(&self, payload: &WebhookPayload, raw: &JsonValue) -> SyncResult<WebhookOutcome> {
        let mut tx = self.pool.begin().await?;

        // Resolve the case by process number first, tracking id second.
        let mut case = None;
        if let Some(number) = payload.process_number.as_deref() {
            case = LegalCase::find_by_process_number(&mut tx, number).await?;
        }
        if case.is_none() {
            if let Some(tracking_id) = payload.tracking_id.as_deref() {
                case = LegalCase::find_by_tracking_id(&mut tx, tracking_id).await?;
            }
        }

        let Some(case) = case else {
            // Events about cases the tenant no longer manages are
            // acknowledged, not errored: the provider must not retry
            // indefinitely. The delivery is still kept.
            ProcessResponse::record(
                &mut tx,
                None,
                None,
                None,
                ResponseSource::Webhook,
                payload.delivery_id.as_deref(),
                raw,
            )
            .await?;
            tx.commit().await?;
            debug!("Webhook matched no local case; acknowledged as ignored");
            return Ok(WebhookOutcome::Ignored);
        };

        LegalCase::update_tracking(
            &mut tx,
            case.id,
            payload.tracking_id.as_deref(),
            payload.hour_range.as_deref(),
        )
        .await?;

        // Attach the delivery to a sync record when the payload names one.
        let remote_request_id = payload.remote_request_id();
        let sync = match remote_request_id.as_deref() {
            Some(request_id) => Some(
                ProcessSync::find_or_create_for_request(
                    &mut tx,
                    case.tenant_id,
                    case.id,
                    request_id,
                )
                .await?,
            ),
            None => None,
        };

        let response = ProcessResponse::record(
            &mut tx,
            Some(case.tenant_id),
            Some(case.id),
            sync.as_ref().map(|s| s.id),
            ResponseSource::Webhook,
            payload.delivery_id.as_deref(),
            raw,
        )
        .await?;

        let scope = AuditScope {
            case_id: Some(case.id),
            sync_id: sync.as_ref().map(|s| s.id),
            response_id: Some(response.id),
        };

        AuditTrail::webhook_received(
            &mut tx,
            case.tenant_id,
            scope,
            remote_request_id.as_deref(),
            payload.reported_status(),
        )
        .await?;

        let mut status_changed = false;
        if let Some(sync) = &sync {
            let previous = sync.status();

            ProcessSync::merge_metadata(
                &mut tx,
                sync.id,
                &json!({
                    "last_webhook_at": chrono::Utc::now(),
                    "last_webhook_status": payload.reported_status(),
                    "result": payload.result,
                    "increment_count": payload.increments.len(),
                }),
            )
            .await?;

            if let Some(reported) = payload.reported_sync_status() {
                status_changed = if reported.is_terminal() {
                    ProcessSync::mark_terminal(
                        &mut tx,
                        sync.id,
                        reported,
                        payload.reported_status(),
                    )
                    .await?
                } else if reported == SyncStatus::Processing {
                    ProcessSync::advance_to_processing(&mut tx, sync.id).await?
                } else {
                    // `pending` never moves a record backwards.
                    false
                };

                if status_changed {
                    AuditTrail::status_update(
                        &mut tx,
                        case.tenant_id,
                        scope,
                        Some(&previous.to_string()),
                        &reported.to_string(),
                        None,
                    )
                    .await?;
                }
            }
        }

        // Increment sub-events are the provider's fine-grained progress
        // notifications; each one is preserved in the audit trail even
        // though none changes the sync record's status.
        for increment in &payload.increments {
            let increment_type = increment
                .get("type")
                .or_else(|| increment.get("increment_type"))
                .or_else(|| increment.get("event_type"))
                .and_then(JsonValue::as_str)
                .unwrap_or("increment");
            AuditTrail::increment(&mut tx, case.tenant_id, scope, increment_type, increment)
                .await?;
        }

        tx.commit().await?;
        info!(
            case_id = %case.id,
            sync_id = ?scope.sync_id,
            status_changed,
            "Webhook delivery reconciled"
        );
        Ok(WebhookOutcome::Processed {
            case_id: case.id,
            sync_id: scope.sync_id,
            status_changed,
        })
    }
}
