//! Manual sync trigger and status handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;
use uuid::Uuid;

use juris_db::models::{LegalCase, ProcessSync, SyncAudit, SyncRequestType};
use juris_provider::ProviderError;
use juris_sync::SyncError;

use crate::auth::AuthContext;
use crate::error::{ApiResult, SyncApiError};
use crate::models::{
    AuditEventView, CaseSyncStatusResponse, CaseView, SyncSummary, TriggerSyncResponse,
};
use crate::router::SyncApiState;

const RECENT_EVENT_LIMIT: i64 = 20;

async fn load_trigger_response(
    state: &SyncApiState,
    tenant_id: Uuid,
    case_id: Uuid,
    sync_id: Uuid,
) -> ApiResult<TriggerSyncResponse> {
    let case = LegalCase::find_by_id(state.pool(), tenant_id, case_id)
        .await?
        .ok_or(SyncApiError::Sync(SyncError::CaseNotFound))?;
    let sync = ProcessSync::find_by_id(state.pool(), tenant_id, sync_id)
        .await?
        .ok_or(SyncApiError::Sync(SyncError::CaseNotFound))?;
    Ok(TriggerSyncResponse {
        case: CaseView::from(&case),
        sync: SyncSummary::from(&sync),
    })
}

/// Trigger a sync attempt for a case and wait for its outcome.
#[utoipa::path(
    post,
    path = "/cases/{id}/sync",
    tag = "Sync",
    params(("id" = Uuid, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Sync completed", body = TriggerSyncResponse),
        (status = 202, description = "Poll budget exhausted; sync still in flight", body = TriggerSyncResponse),
        (status = 401, description = "Missing tenant identity"),
        (status = 403, description = "Synchronization disabled for this plan"),
        (status = 404, description = "Case not found"),
        (status = 409, description = "No provider credential configured"),
        (status = 429, description = "Sync quota exhausted"),
        (status = 502, description = "Provider failure"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn trigger_sync_handler(
    State(state): State<SyncApiState>,
    auth: AuthContext,
    Path(case_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<TriggerSyncResponse>)> {
    let run = state
        .orchestrator
        .run_sync(auth.tenant_id, case_id, SyncRequestType::Manual, auth.user_id)
        .await;

    match run {
        Ok(outcome) => {
            info!(%case_id, sync_id = %outcome.sync_id, "Manual sync completed");
            let response =
                load_trigger_response(&state, auth.tenant_id, case_id, outcome.sync_id).await?;
            Ok((StatusCode::OK, Json(response)))
        }
        // Poll timeout leaves the record open for a later webhook; report
        // the in-flight state instead of an error.
        Err(SyncError::Provider(ProviderError::PollTimeout { .. })) => {
            let latest = ProcessSync::find_latest_for_case(state.pool(), auth.tenant_id, case_id)
                .await?
                .ok_or(SyncApiError::Sync(SyncError::CaseNotFound))?;
            let response =
                load_trigger_response(&state, auth.tenant_id, case_id, latest.id).await?;
            Ok((StatusCode::ACCEPTED, Json(response)))
        }
        Err(err) => Err(err.into()),
    }
}

/// Current sync state of a case: latest attempt plus recent audit events.
#[utoipa::path(
    get,
    path = "/cases/{id}/sync",
    tag = "Sync",
    params(("id" = Uuid, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case sync state", body = CaseSyncStatusResponse),
        (status = 401, description = "Missing tenant identity"),
        (status = 404, description = "Case not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_sync_status_handler(
    State(state): State<SyncApiState>,
    auth: AuthContext,
    Path(case_id): Path<Uuid>,
) -> ApiResult<Json<CaseSyncStatusResponse>> {
    let case = LegalCase::find_by_id(state.pool(), auth.tenant_id, case_id)
        .await?
        .ok_or(SyncApiError::Sync(SyncError::CaseNotFound))?;

    let latest = ProcessSync::find_latest_for_case(state.pool(), auth.tenant_id, case_id).await?;
    let events =
        SyncAudit::list_for_case(state.pool(), auth.tenant_id, case_id, RECENT_EVENT_LIMIT)
            .await?;

    Ok(Json(CaseSyncStatusResponse {
        case: CaseView::from(&case),
        latest_sync: latest.as_ref().map(SyncSummary::from),
        recent_events: events.iter().map(AuditEventView::from).collect(),
    }))
}
