//! Axum router setup for sync endpoints.

use std::sync::Arc;

use axum::{routing::post, Router};
use sqlx::PgPool;

use juris_sync::{SyncOrchestrator, WebhookReconciler};

use crate::handlers::{sync, webhook};

/// Shared state for sync handlers.
#[derive(Clone)]
pub struct SyncApiState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub reconciler: WebhookReconciler,
    pool: PgPool,
}

impl SyncApiState {
    /// Create a new sync API state.
    pub fn new(pool: PgPool, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            orchestrator,
            reconciler: WebhookReconciler::new(pool.clone()),
            pool,
        }
    }

    /// Get a reference to the database pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Creates the sync router with all routes.
pub fn sync_router(state: SyncApiState) -> Router {
    Router::new()
        .route(
            "/cases/:id/sync",
            post(sync::trigger_sync_handler).get(sync::get_sync_status_handler),
        )
        .route(
            "/integrations/:provider/webhook",
            post(webhook::webhook_handler),
        )
        .with_state(state)
}
