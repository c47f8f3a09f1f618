//! Inbound provider webhook handler.
//!
//! The endpoint is deliberately forgiving: deliveries for unknown cases
//! are acknowledged (202) rather than errored, so the provider never
//! retries them forever, and the raw payload is preserved either way.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use juris_sync::{WebhookOutcome, WebhookPayload};

use crate::error::{ApiResult, SyncApiError};
use crate::models::WebhookAck;
use crate::router::SyncApiState;

/// Receive a provider webhook delivery.
#[utoipa::path(
    post,
    path = "/integrations/{provider}/webhook",
    tag = "Sync",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Delivery applied to a local case", body = WebhookAck),
        (status = 202, description = "Delivery matched no local case; acknowledged", body = WebhookAck),
        (status = 400, description = "Payload is not a JSON object"),
    )
)]
pub async fn webhook_handler(
    State(state): State<SyncApiState>,
    Path(provider): Path<String>,
    Json(raw): Json<JsonValue>,
) -> ApiResult<(StatusCode, Json<WebhookAck>)> {
    let payload: WebhookPayload = serde_json::from_value(raw.clone())
        .map_err(|e| SyncApiError::Validation(format!("malformed webhook payload: {e}")))?;

    match state.reconciler.ingest(&payload, &raw).await? {
        WebhookOutcome::Processed {
            case_id,
            sync_id,
            status_changed,
        } => {
            info!(%provider, %case_id, ?sync_id, status_changed, "Webhook processed");
            Ok((StatusCode::OK, Json(WebhookAck::ok(sync_id))))
        }
        WebhookOutcome::Ignored => {
            warn!(%provider, "Webhook matched no local case");
            Ok((StatusCode::ACCEPTED, Json(WebhookAck::ignored())))
        }
    }
}
