//! # juris-sync
//!
//! The external legal-process synchronization engine.
//!
//! Keeps a locally stored legal case in sync with a third-party
//! legal-tracking provider, reconciling two independent update channels —
//! synchronous polling and asynchronous webhook delivery — into one
//! consistent lifecycle.
//!
//! Components:
//! - [`CredentialResolver`]: per-tenant provider credential lookup with an
//!   explicit legacy fallback policy
//! - [`QuotaGovernor`]: pure plan-based gate, evaluated before any
//!   provider call
//! - [`SyncOrchestrator`]: drives on-demand syncs end-to-end (submit,
//!   poll, normalize, record terminal state)
//! - [`WebhookReconciler`]: ingests asynchronous provider callbacks,
//!   racing with the orchestrator over the same sync records
//! - [`normalizer`]: pure transforms from raw provider entries to the
//!   canonical dataset, persisted with replace semantics
//! - [`AuditTrail`]: append-only record of every lifecycle transition

pub mod audit;
pub mod credentials;
pub mod error;
pub mod normalizer;
pub mod orchestrator;
pub mod quota;
pub mod reconciler;

pub use audit::{AuditScope, AuditTrail};
pub use credentials::{CredentialResolver, ResolvedCredential};
pub use error::{SyncError, SyncResult};
pub use normalizer::normalize_lawsuit;
pub use orchestrator::{ProviderFactory, ReqwestProviderFactory, SyncOrchestrator, SyncOutcome};
pub use quota::{PgPlanLimits, PlanLimits, PlanLimitsService, QuotaGovernor};
pub use reconciler::{WebhookOutcome, WebhookPayload, WebhookReconciler};
