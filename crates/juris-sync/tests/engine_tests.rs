//! Integration tests for the sync engine against a real PostgreSQL.
//!
//! Run with: `cargo test -p juris-sync --features integration`

#![cfg(feature = "integration")]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{lawsuit_entry, unique_case_number, CountingFactory, ScriptedProvider, TestContext};
use juris_db::models::{CaseDataset, ProcessSync, SyncAudit, SyncRequestType, SyncStatus};
use juris_provider::{ProviderError, RequestStatus};
use juris_sync::{
    normalize_lawsuit, normalizer::persist_dataset, CredentialResolver, PgPlanLimits, SyncError,
    SyncOrchestrator, WebhookOutcome, WebhookPayload, WebhookReconciler,
};

fn orchestrator(ctx: &TestContext, factory: Arc<CountingFactory>) -> SyncOrchestrator {
    let resolver = CredentialResolver::new(ctx.pool.clone(), ctx.provider.as_str());
    let limits = Arc::new(PgPlanLimits::new(ctx.pool.clone()));
    SyncOrchestrator::new(ctx.pool.clone(), resolver, limits, factory)
        .with_polling(Duration::from_millis(5), 5)
}

#[tokio::test]
async fn quota_gate_precedes_network() {
    let ctx = TestContext::new().await;
    ctx.with_credential().await;
    ctx.with_plan(true, 0).await; // enabled but exhausted
    let number = unique_case_number();
    let case = ctx.case(&number).await;

    let provider = Arc::new(ScriptedProvider::completing_with(
        vec![RequestStatus::Completed],
        vec![lawsuit_entry(&number)],
    ));
    let factory = Arc::new(CountingFactory::new(provider.clone()));
    let orch = orchestrator(&ctx, factory.clone());

    let err = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::QuotaExceeded { .. }));
    assert_eq!(factory.connects.load(Ordering::SeqCst), 0);
    assert_eq!(provider.total_calls(), 0);

    // No sync record: usage counts records, so the denial must leave none.
    // The denial is visible on the audit trail instead.
    let sync = ProcessSync::find_latest_for_case(&ctx.pool, ctx.tenant_id, case.id)
        .await
        .unwrap();
    assert!(sync.is_none());
    let audits = SyncAudit::list_for_case(&ctx.pool, ctx.tenant_id, case.id, 10)
        .await
        .unwrap();
    assert!(audits.iter().any(|a| a.event_type == "sync_failed"));
}

#[tokio::test]
async fn first_sync_is_allowed_at_quota_boundary() {
    let ctx = TestContext::new().await;
    ctx.with_credential().await;
    ctx.with_plan(true, 1).await;
    let number = unique_case_number();
    let case = ctx.case(&number).await;

    let provider = Arc::new(ScriptedProvider::completing_with(
        vec![RequestStatus::Completed],
        vec![lawsuit_entry(&number)],
    ));
    let factory = Arc::new(CountingFactory::new(provider));
    let orch = orchestrator(&ctx, factory);

    // Zero prior usage: a quota of 1 admits exactly one sync.
    let outcome = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .expect("first sync under quota 1 should be admitted");
    assert_eq!(outcome.status, SyncStatus::Completed);

    let err = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .unwrap_err();
    match err {
        SyncError::QuotaExceeded { used, quota } => {
            assert_eq!(used, 1);
            assert_eq!(quota, 1);
        }
        other => panic!("expected QuotaExceeded, got {other:?}"),
    }

    // The denial consumed nothing: usage still reports 1 and only the
    // completed attempt left a record.
    let err = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::QuotaExceeded { used: 1, .. }));
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM process_syncs WHERE tenant_id = $1")
            .bind(ctx.tenant_id)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn disabled_plan_is_a_distinct_denial() {
    let ctx = TestContext::new().await;
    ctx.with_credential().await;
    ctx.with_plan(false, 100).await;
    let case = ctx.case(&unique_case_number()).await;

    let provider = Arc::new(ScriptedProvider::completing_with(vec![], vec![]));
    let factory = Arc::new(CountingFactory::new(provider.clone()));
    let orch = orchestrator(&ctx, factory);

    let err = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::IntegrationDisabled));
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn missing_credential_fails_closed() {
    let ctx = TestContext::new().await;
    ctx.with_plan(true, 100).await;
    let case = ctx.case(&unique_case_number()).await;

    let provider = Arc::new(ScriptedProvider::completing_with(vec![], vec![]));
    let factory = Arc::new(CountingFactory::new(provider.clone()));
    let orch = orchestrator(&ctx, factory);

    let err = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotConfigured));

    // Denied before a record existed; only the audit event remains.
    let sync = ProcessSync::find_latest_for_case(&ctx.pool, ctx.tenant_id, case.id)
        .await
        .unwrap();
    assert!(sync.is_none());
    let audits = SyncAudit::list_for_case(&ctx.pool, ctx.tenant_id, case.id, 10)
        .await
        .unwrap();
    assert!(audits.iter().any(|a| a.event_type == "sync_failed"));
}

#[tokio::test]
async fn end_to_end_manual_sync() {
    let ctx = TestContext::new().await;
    ctx.with_credential().await;
    ctx.with_plan(true, 100).await;
    let number = unique_case_number();
    let case = ctx.case(&number).await;

    let provider = Arc::new(ScriptedProvider::completing_with(
        vec![RequestStatus::Processing, RequestStatus::Completed],
        vec![lawsuit_entry(&number)],
    ));
    let factory = Arc::new(CountingFactory::new(provider.clone()));
    let orch = orchestrator(&ctx, factory);

    let outcome = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .expect("sync should complete");

    assert_eq!(outcome.status, SyncStatus::Completed);
    let counts = outcome.counts.unwrap();
    assert_eq!(counts.parties, 2);
    assert_eq!(counts.movements, 3);
    assert_eq!(counts.attachments, 1);

    let stored = CaseDataset::stored_counts(&ctx.pool, ctx.tenant_id, &number)
        .await
        .unwrap();
    assert_eq!(stored.parties, 2);
    assert_eq!(stored.movements, 3);
    assert_eq!(stored.attachments, 1);

    // Audit chain: submit, pending→processing, processing→completed,
    // completion summary.
    let audits = SyncAudit::list_for_sync(&ctx.pool, ctx.tenant_id, outcome.sync_id)
        .await
        .unwrap();
    assert!(audits.len() >= 4, "expected >= 4 audit events, got {}", audits.len());
    assert!(audits.iter().any(|a| a.event_type == "request_submitted"));
    assert!(audits.iter().any(|a| a.event_type == "sync_completed"));

    // Tracking handle was created and persisted.
    let case = juris_db::models::LegalCase::find_by_id(&ctx.pool, ctx.tenant_id, case.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.tracking_id.as_deref(), Some("trk-test"));
    assert!(case.last_sync_at.is_some());
}

#[tokio::test]
async fn poll_timeout_leaves_record_open() {
    let ctx = TestContext::new().await;
    ctx.with_credential().await;
    ctx.with_plan(true, 100).await;
    let case = ctx.case(&unique_case_number()).await;

    let provider = Arc::new(ScriptedProvider::completing_with(
        vec![RequestStatus::Processing],
        vec![],
    ));
    let factory = Arc::new(CountingFactory::new(provider.clone()));
    let orch = orchestrator(&ctx, factory);

    let err = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Provider(ProviderError::PollTimeout { .. })
    ));

    // Still processing: a later webhook may complete it.
    let sync = ProcessSync::find_latest_for_case(&ctx.pool, ctx.tenant_id, case.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sync.status(), SyncStatus::Processing);
}

#[tokio::test]
async fn provider_reported_failure_marks_failed() {
    let ctx = TestContext::new().await;
    ctx.with_credential().await;
    ctx.with_plan(true, 100).await;
    let case = ctx.case(&unique_case_number()).await;

    let provider = Arc::new(ScriptedProvider::completing_with(
        vec![RequestStatus::Failed],
        vec![],
    ));
    let factory = Arc::new(CountingFactory::new(provider.clone()));
    let orch = orchestrator(&ctx, factory);

    let err = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RemoteFailure { .. }));

    let sync = ProcessSync::find_latest_for_case(&ctx.pool, ctx.tenant_id, case.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sync.status(), SyncStatus::Failed);
}

#[tokio::test]
async fn submit_failure_marks_failed_with_provider_reason() {
    let ctx = TestContext::new().await;
    ctx.with_credential().await;
    ctx.with_plan(true, 100).await;
    let case = ctx.case(&unique_case_number()).await;

    let provider = Arc::new(ScriptedProvider::failing_request(403));
    let factory = Arc::new(CountingFactory::new(provider.clone()));
    let orch = orchestrator(&ctx, factory);

    let err = orch
        .run_sync(ctx.tenant_id, case.id, SyncRequestType::Manual, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Provider(ProviderError::Api { status: 403, .. })
    ));

    let sync = ProcessSync::find_latest_for_case(&ctx.pool, ctx.tenant_id, case.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sync.status(), SyncStatus::Failed);

    let audits = SyncAudit::list_for_sync(&ctx.pool, ctx.tenant_id, sync.id)
        .await
        .unwrap();
    assert!(audits.iter().any(|a| a.event_type == "sync_failed"));
}

#[tokio::test]
async fn normalizer_replace_is_idempotent() {
    let ctx = TestContext::new().await;
    let number = unique_case_number();
    let case = ctx.case(&number).await;
    let entry = lawsuit_entry(&number);
    let dataset = normalize_lawsuit(&entry.response_data, &number);

    for _ in 0..2 {
        let mut tx = ctx.pool.begin().await.unwrap();
        persist_dataset(&mut tx, ctx.tenant_id, case.id, &dataset)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    let stored = CaseDataset::stored_counts(&ctx.pool, ctx.tenant_id, &number)
        .await
        .unwrap();
    assert_eq!(stored, dataset.counts());
}

#[tokio::test]
async fn webhook_with_unknown_request_creates_sync_record() {
    let ctx = TestContext::new().await;
    let number = unique_case_number();
    let case = ctx.case(&number).await;
    let reconciler = WebhookReconciler::new(ctx.pool.clone());

    let raw = json!({
        "process_number": number,
        "request_id": "req-from-nowhere",
        "status": "processing"
    });
    let payload: WebhookPayload = serde_json::from_value(raw.clone()).unwrap();

    let outcome = reconciler.ingest(&payload, &raw).await.unwrap();
    match outcome {
        WebhookOutcome::Processed { sync_id, .. } => {
            let sync = ProcessSync::find_by_id(&ctx.pool, ctx.tenant_id, sync_id.unwrap())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(sync.case_id, case.id);
            assert_eq!(sync.remote_request_id.as_deref(), Some("req-from-nowhere"));
            assert_eq!(sync.request_type(), SyncRequestType::Webhook);
        }
        other => panic!("expected Processed, got {other:?}"),
    }
}

#[tokio::test]
async fn webhook_replay_is_idempotent_on_sync_state() {
    let ctx = TestContext::new().await;
    let number = unique_case_number();
    let case = ctx.case(&number).await;
    let reconciler = WebhookReconciler::new(ctx.pool.clone());

    let raw = json!({
        "process_number": number,
        "request_id": "req-replayed",
        "status": "completed",
        "delivery_id": "d-1"
    });
    let payload: WebhookPayload = serde_json::from_value(raw.clone()).unwrap();

    reconciler.ingest(&payload, &raw).await.unwrap();
    reconciler.ingest(&payload, &raw).await.unwrap();

    // One sync record, still completed; replay did not spawn a second.
    let mut conn = ctx.pool.acquire().await.unwrap();
    let sync = ProcessSync::find_by_remote_request_id(&mut conn, ctx.tenant_id, "req-replayed")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sync.status(), SyncStatus::Completed);
    assert_eq!(sync.case_id, case.id);

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM process_syncs WHERE tenant_id = $1 AND remote_request_id = $2",
    )
    .bind(ctx.tenant_id)
    .bind("req-replayed")
    .fetch_one(&ctx.pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn duplicate_webhook_rows_for_one_request_are_rejected() {
    let ctx = TestContext::new().await;
    let case = ctx.case(&unique_case_number()).await;

    let mut conn = ctx.pool.acquire().await.unwrap();
    let first =
        ProcessSync::find_or_create_for_request(&mut conn, ctx.tenant_id, case.id, "req-dup")
            .await
            .unwrap();
    let second =
        ProcessSync::find_or_create_for_request(&mut conn, ctx.tenant_id, case.id, "req-dup")
            .await
            .unwrap();
    assert_eq!(first.id, second.id);

    // The unique index holds even for a writer that skips the lookup, so
    // two concurrent deliveries cannot both insert.
    let raw = sqlx::query(
        "INSERT INTO process_syncs (tenant_id, case_id, remote_request_id, request_type, status) \
         VALUES ($1, $2, $3, 'webhook', 'processing')",
    )
    .bind(ctx.tenant_id)
    .bind(case.id)
    .bind("req-dup")
    .execute(&ctx.pool)
    .await;
    assert!(raw.is_err());
}

#[tokio::test]
async fn completed_record_is_not_regressed_by_late_webhook() {
    let ctx = TestContext::new().await;
    let number = unique_case_number();
    ctx.case(&number).await;
    let reconciler = WebhookReconciler::new(ctx.pool.clone());

    let complete = json!({
        "process_number": number,
        "request_id": "req-final",
        "status": "completed"
    });
    let payload: WebhookPayload = serde_json::from_value(complete.clone()).unwrap();
    reconciler.ingest(&payload, &complete).await.unwrap();

    let regress = json!({
        "process_number": number,
        "request_id": "req-final",
        "status": "pending"
    });
    let payload: WebhookPayload = serde_json::from_value(regress.clone()).unwrap();
    let outcome = reconciler.ingest(&payload, &regress).await.unwrap();

    match outcome {
        WebhookOutcome::Processed {
            sync_id,
            status_changed,
            ..
        } => {
            assert!(!status_changed);
            let sync = ProcessSync::find_by_id(&ctx.pool, ctx.tenant_id, sync_id.unwrap())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(sync.status(), SyncStatus::Completed);
        }
        other => panic!("expected Processed, got {other:?}"),
    }
}

#[tokio::test]
async fn unmatched_webhook_is_acknowledged_and_preserved() {
    let ctx = TestContext::new().await;
    let reconciler = WebhookReconciler::new(ctx.pool.clone());

    // No case with this number exists anywhere.
    let delivery_id = format!("d-ignored-{}", uuid::Uuid::new_v4());
    let raw = json!({
        "process_number": unique_case_number(),
        "delivery_id": delivery_id,
        "status": "completed"
    });
    let payload: WebhookPayload = serde_json::from_value(raw.clone()).unwrap();
    let outcome = reconciler.ingest(&payload, &raw).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM process_responses WHERE delivery_id = $1 AND tenant_id IS NULL",
    )
    .bind(&delivery_id)
    .fetch_one(&ctx.pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn webhook_increments_are_all_audited() {
    let ctx = TestContext::new().await;
    let number = unique_case_number();
    let case = ctx.case(&number).await;
    let reconciler = WebhookReconciler::new(ctx.pool.clone());

    let raw = json!({
        "process_number": number,
        "request_id": "req-incr",
        "status": "processing",
        "increments": [
            {"type": "movement_added", "step_id": "s9"},
            {"type": "party_added", "name": "Novo Réu"},
            {"no_type_key": true}
        ]
    });
    let payload: WebhookPayload = serde_json::from_value(raw.clone()).unwrap();
    reconciler.ingest(&payload, &raw).await.unwrap();

    let audits = SyncAudit::list_for_case(&ctx.pool, ctx.tenant_id, case.id, 50)
        .await
        .unwrap();
    assert!(audits.iter().any(|a| a.event_type == "movement_added"));
    assert!(audits.iter().any(|a| a.event_type == "party_added"));
    assert!(audits.iter().any(|a| a.event_type == "increment"));
    assert!(audits.iter().any(|a| a.event_type == "webhook_received"));
}

#[tokio::test]
async fn webhook_updates_tracking_handle_opportunistically() {
    let ctx = TestContext::new().await;
    let number = unique_case_number();
    let case = ctx.case(&number).await;
    let reconciler = WebhookReconciler::new(ctx.pool.clone());

    let raw = json!({
        "process_number": number,
        "tracking_id": format!("trk-{}", case.id),
        "hour_range": "08-12"
    });
    let payload: WebhookPayload = serde_json::from_value(raw.clone()).unwrap();
    reconciler.ingest(&payload, &raw).await.unwrap();

    let refreshed = juris_db::models::LegalCase::find_by_id(&ctx.pool, ctx.tenant_id, case.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.tracking_id.as_deref(), Some(format!("trk-{}", case.id).as_str()));

    // A sparse payload must not erase the handle.
    let raw = json!({ "process_number": number, "status": "processing" });
    let payload: WebhookPayload = serde_json::from_value(raw.clone()).unwrap();
    reconciler.ingest(&payload, &raw).await.unwrap();

    let refreshed = juris_db::models::LegalCase::find_by_id(&ctx.pool, ctx.tenant_id, case.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.tracking_id.as_deref(), Some(format!("trk-{}", case.id).as_str()));
    assert_eq!(refreshed.hour_range.as_deref(), Some("08-12"));
}

#[tokio::test]
async fn credential_resolution_prefers_tenant_scope() {
    let ctx = TestContext::new().await;
    let tenant_cred = ctx.with_credential().await;
    juris_db::models::IntegrationCredential::create(
        &ctx.pool,
        None,
        &ctx.provider,
        "test",
        "https://global.test",
        "global-key",
    )
    .await
    .unwrap();

    let resolver = CredentialResolver::new(ctx.pool.clone(), ctx.provider.as_str());
    let resolved = resolver.resolve(ctx.tenant_id).await.unwrap();
    assert_eq!(resolved.credential_id, tenant_cred.id);

    // Another tenant without its own credential falls through to global.
    let other = uuid::Uuid::new_v4();
    let resolved = resolver.resolve(other).await.unwrap();
    assert_eq!(resolved.base_url, "https://global.test");
}

#[tokio::test]
async fn legacy_fallback_is_opt_in() {
    let ctx = TestContext::new().await;
    // Credential scoped to some other tenant only, under its own provider
    // slug so no other test can interfere.
    let provider = format!("{}-fallback", ctx.provider);
    let foreign = uuid::Uuid::new_v4();
    juris_db::models::IntegrationCredential::create(
        &ctx.pool,
        Some(foreign),
        &provider,
        "test",
        "https://foreign.test",
        "foreign-key",
    )
    .await
    .unwrap();

    let strict = CredentialResolver::new(ctx.pool.clone(), provider.as_str());
    assert!(matches!(
        strict.resolve(ctx.tenant_id).await,
        Err(SyncError::NotConfigured)
    ));

    let lenient =
        CredentialResolver::new(ctx.pool.clone(), provider.as_str()).with_legacy_fallback(true);
    let resolved = lenient.resolve(ctx.tenant_id).await.unwrap();
    assert_eq!(resolved.base_url, "https://foreign.test");
}
