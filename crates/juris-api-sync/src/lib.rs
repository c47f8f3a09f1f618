//! HTTP surface for the legal-process sync engine.
//!
//! Exposes the manual sync trigger, the case sync status view and the
//! inbound provider webhook endpoint on top of [`juris_sync`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;

pub use auth::AuthContext;
pub use error::{ApiResult, ErrorResponse, SyncApiError};
pub use models::{CaseSyncStatusResponse, SyncSummary, TriggerSyncResponse, WebhookAck};
pub use router::{sync_router, SyncApiState};
