//! Sync orchestrator.
//!
//! Drives one on-demand sync attempt end-to-end:
//! `pending → processing → {completed | failed}`.
//!
//! The policy gates (credentials, quota) run before the sync record is
//! created, so a denied attempt neither touches the provider nor counts
//! toward quota usage. On the completion path every database write
//! happens inside one
//! transaction, rolled back wholesale on failure; the failure itself is
//! then recorded outside that transaction so a failed attempt is always
//! observable. A poll-budget timeout is the one non-terminal exit: the
//! record stays `processing` for a later webhook to resolve.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use juris_db::models::{
    CreateProcessSync, DatasetCounts, LegalCase, ProcessResponse, ProcessSync, ResponseSource,
    SyncRequestType, SyncStatus,
};
use juris_provider::{
    fetch_all_results, poll_until_terminal, ProviderApi, ProviderClient, ProviderConfig,
    ProviderError, RequestStatus, ResponseEntry,
};

use crate::audit::{AuditScope, AuditTrail};
use crate::credentials::{CredentialResolver, ResolvedCredential};
use crate::error::{SyncError, SyncResult};
use crate::normalizer::{normalize_lawsuit, normalize_process_number, persist_dataset};
use crate::quota::{PlanLimitsService, QuotaGovernor};

/// Builds a provider API client for a resolved credential.
///
/// The seam that lets tests count provider calls without a network.
pub trait ProviderFactory: Send + Sync {
    fn connect(&self, credential: &ResolvedCredential) -> SyncResult<Arc<dyn ProviderApi>>;
}

/// Default factory backed by [`ProviderClient`].
pub struct ReqwestProviderFactory {
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ReqwestProviderFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }
}

impl Default for ReqwestProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for ReqwestProviderFactory {
    fn connect(&self, credential: &ResolvedCredential) -> SyncResult<Arc<dyn ProviderApi>> {
        let config = ProviderConfig::new(&credential.base_url, &credential.api_key)
            .with_max_retries(self.max_retries)
            .with_backoff_base_ms(self.backoff_base_ms);
        let client = ProviderClient::new(config)?;
        Ok(Arc::new(client))
    }
}

/// Result of a completed orchestrator run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub sync_id: Uuid,
    pub status: SyncStatus,
    pub counts: Option<DatasetCounts>,
}

/// Drives sync attempts for cases.
pub struct SyncOrchestrator {
    pool: PgPool,
    resolver: CredentialResolver,
    limits: Arc<dyn PlanLimitsService>,
    factory: Arc<dyn ProviderFactory>,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

impl SyncOrchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        pool: PgPool,
        resolver: CredentialResolver,
        limits: Arc<dyn PlanLimitsService>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            pool,
            resolver,
            limits,
            factory,
            poll_interval: Duration::from_secs(5),
            poll_max_attempts: 24,
        }
    }

    /// Override the poll cadence.
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_max_attempts = max_attempts;
        self
    }

    /// Run one sync attempt for a case.
    ///
    /// Returns the attempt outcome, or a typed error that has already been
    /// recorded on the sync record and audit trail.
    #[instrument(skip_all, fields(%tenant_id, %case_id))]
    pub async fn run_sync(
        &self,
        tenant_id: Uuid,
        case_id: Uuid,
        request_type: SyncRequestType,
        requested_by: Option<Uuid>,
    ) -> SyncResult<SyncOutcome> {
        let case = LegalCase::find_by_id(&self.pool, tenant_id, case_id)
            .await?
            .ok_or(SyncError::CaseNotFound)?;

        // Policy gates run before the sync record is created: usage is the
        // count of existing records, so a denied attempt must leave none
        // behind or a denial would cost quota.
        let gate_scope = AuditScope {
            case_id: Some(case_id),
            sync_id: None,
            response_id: None,
        };
        let credential = match self.resolver.resolve(tenant_id).await {
            Ok(c) => c,
            Err(err) => return self.deny_attempt(tenant_id, gate_scope, err).await,
        };
        if let Err(err) = QuotaGovernor::check(self.limits.as_ref(), tenant_id).await {
            return self.deny_attempt(tenant_id, gate_scope, err).await;
        }

        let sync = ProcessSync::create(
            &self.pool,
            tenant_id,
            &CreateProcessSync {
                case_id,
                credential_id: Some(credential.credential_id),
                request_type,
                requested_by,
                request_payload: Some(json!({
                    "process_number": case.process_number,
                })),
            },
        )
        .await?;
        let scope = AuditScope {
            case_id: Some(case_id),
            sync_id: Some(sync.id),
            response_id: None,
        };

        let api = self.factory.connect(&credential)?;

        self.ensure_tracking(&case, api.as_ref()).await;

        let request = match api.create_request(&case.process_number).await {
            Ok(r) => r,
            Err(err) => return self.fail_attempt(tenant_id, scope, err.into()).await,
        };
        ProcessSync::mark_processing(&self.pool, sync.id, &request.request_id).await?;
        {
            let mut conn = self.pool.acquire().await?;
            AuditTrail::request_submitted(&mut conn, tenant_id, scope, &request.request_id)
                .await?;
            AuditTrail::status_update(&mut conn, tenant_id, scope, Some("pending"), "processing", None)
                .await?;
        }

        let final_info = match poll_until_terminal(
            api.as_ref(),
            &request.request_id,
            self.poll_interval,
            self.poll_max_attempts,
        )
        .await
        {
            Ok(info) => info,
            Err(ProviderError::PollTimeout { attempts }) => {
                // Deliberately non-terminal: a later webhook may still
                // complete this record.
                let mut conn = self.pool.acquire().await?;
                AuditTrail::status_update(
                    &mut conn,
                    tenant_id,
                    scope,
                    Some("processing"),
                    "processing",
                    Some(json!({ "timeout": true, "poll_attempts": attempts })),
                )
                .await?;
                warn!(sync_id = %sync.id, attempts, "Poll budget exhausted; leaving record open");
                return Err(SyncError::Provider(ProviderError::PollTimeout { attempts }));
            }
            Err(err) => return self.fail_attempt(tenant_id, scope, err.into()).await,
        };

        match final_info.status {
            RequestStatus::Completed => {
                match self
                    .complete_attempt(tenant_id, &case, sync.id, scope, &request.request_id, api.as_ref())
                    .await
                {
                    Ok(counts) => {
                        info!(sync_id = %sync.id, ?counts, "Sync completed");
                        Ok(SyncOutcome {
                            sync_id: sync.id,
                            status: SyncStatus::Completed,
                            counts: Some(counts),
                        })
                    }
                    Err(err) => self.fail_attempt(tenant_id, scope, err).await,
                }
            }
            status => {
                let message = final_info
                    .message
                    .unwrap_or_else(|| "request did not complete".to_string());
                self.fail_attempt(
                    tenant_id,
                    scope,
                    SyncError::RemoteFailure {
                        status: status.as_str().to_string(),
                        message,
                    },
                )
                .await
            }
        }
    }

    /// Create or renew the provider-side tracking for a case.
    ///
    /// Tracking failures do not abort the sync: the one-shot request path
    /// still works without a watch, it just will not receive webhooks.
    async fn ensure_tracking(&self, case: &LegalCase, api: &dyn ProviderApi) {
        match &case.tracking_id {
            Some(tracking_id) => {
                if let Err(err) = api.renew_tracking(tracking_id).await {
                    warn!(case_id = %case.id, %err, "Failed to renew tracking");
                }
            }
            None => match api
                .create_tracking(&case.process_number, case.hour_range.as_deref())
                .await
            {
                Ok(tracking) => {
                    if let Err(err) = LegalCase::set_tracking(
                        &self.pool,
                        case.id,
                        &tracking.tracking_id,
                        tracking.hour_range.as_deref(),
                    )
                    .await
                    {
                        warn!(case_id = %case.id, %err, "Failed to persist tracking handle");
                    }
                }
                Err(err) => {
                    warn!(case_id = %case.id, %err, "Failed to create tracking");
                }
            },
        }
    }

    /// The completion path: fetch results, normalize, replace the dataset
    /// and mark the record completed — all in one transaction.
    async fn complete_attempt(
        &self,
        tenant_id: Uuid,
        case: &LegalCase,
        sync_id: Uuid,
        scope: AuditScope,
        request_id: &str,
        api: &dyn ProviderApi,
    ) -> SyncResult<DatasetCounts> {
        let pages = fetch_all_results(api, request_id).await?;
        let entries: Vec<ResponseEntry> = pages
            .iter()
            .flat_map(|p| p.page_data.iter().cloned())
            .collect();
        let entry = select_entry(&entries, &case.process_number)
            .ok_or_else(|| SyncError::Normalization("no lawsuit entry in results".to_string()))?;

        let dataset = normalize_lawsuit(&entry.response_data, &case.process_number);

        let mut tx = self.pool.begin().await?;

        let mut last_response_id = None;
        for page in &pages {
            let response = ProcessResponse::record(
                &mut tx,
                Some(tenant_id),
                Some(case.id),
                Some(sync_id),
                ResponseSource::Poll,
                None,
                &serde_json::to_value(page).map_err(|e| SyncError::Normalization(e.to_string()))?,
            )
            .await?;
            last_response_id = Some(response.id);
        }

        let counts = persist_dataset(&mut tx, tenant_id, case.id, &dataset).await?;

        ProcessSync::mark_terminal(&mut tx, sync_id, SyncStatus::Completed, None).await?;
        ProcessSync::merge_metadata(
            &mut tx,
            sync_id,
            &json!({
                "counts": counts,
                "request_id": request_id,
                "pages": pages.len(),
            }),
        )
        .await?;

        let scope = AuditScope {
            response_id: last_response_id,
            ..scope
        };
        AuditTrail::status_update(&mut tx, tenant_id, scope, Some("processing"), "completed", None)
            .await?;
        AuditTrail::completed(&mut tx, tenant_id, scope, &counts).await?;

        tx.commit().await?;
        Ok(counts)
    }

    /// The denial path: the gates rejected the attempt before a sync
    /// record existed, so only an audit event is written.
    async fn deny_attempt<T>(
        &self,
        tenant_id: Uuid,
        scope: AuditScope,
        err: SyncError,
    ) -> SyncResult<T> {
        let message = err.to_string();
        match self.pool.acquire().await {
            Ok(mut conn) => {
                if let Err(db_err) =
                    AuditTrail::failed(&mut conn, tenant_id, scope, err.reason_code(), &message)
                        .await
                {
                    warn!(%db_err, "Failed to record denial audit event");
                }
            }
            Err(db_err) => warn!(%db_err, "Failed to acquire connection for audit"),
        }
        Err(err)
    }

    /// The failure path: record the terminal failure and audit event
    /// outside any rolled-back transaction, then propagate the error.
    async fn fail_attempt<T>(
        &self,
        tenant_id: Uuid,
        scope: AuditScope,
        err: SyncError,
    ) -> SyncResult<T> {
        if let Some(sync_id) = scope.sync_id {
            let message = err.to_string();
            let reason = err.reason_code();
            if let Err(db_err) = ProcessSync::mark_failed(&self.pool, sync_id, &message).await {
                warn!(%sync_id, %db_err, "Failed to record sync failure");
            }
            match self.pool.acquire().await {
                Ok(mut conn) => {
                    if let Err(db_err) =
                        AuditTrail::failed(&mut conn, tenant_id, scope, reason, &message).await
                    {
                        warn!(%sync_id, %db_err, "Failed to record failure audit event");
                    }
                }
                Err(db_err) => warn!(%sync_id, %db_err, "Failed to acquire connection for audit"),
            }
        }
        Err(err)
    }
}

/// Pick the entry to normalize: prefer an exact digit-normalized process
/// number match over the first lawsuit entry returned.
#[must_use]
pub fn select_entry<'a>(
    entries: &'a [ResponseEntry],
    process_number: &str,
) -> Option<&'a ResponseEntry> {
    let wanted = normalize_process_number(process_number);
    let lawsuits: Vec<&ResponseEntry> = entries.iter().filter(|e| e.is_lawsuit()).collect();
    lawsuits
        .iter()
        .find(|e| {
            e.process_number()
                .is_some_and(|n| normalize_process_number(n) == wanted)
        })
        .copied()
        .or_else(|| lawsuits.first().copied())
}
