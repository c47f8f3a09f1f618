//! Error types for the sync engine.
//!
//! Each variant maps to a distinct user-visible remediation: quota
//! exhaustion, disabled integration, missing credentials and provider
//! failures must never collapse into a generic error.

use juris_provider::ProviderError;
use thiserror::Error;

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync engine errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No usable provider credential for the tenant. Fatal to the attempt,
    /// not to the process.
    #[error("No active provider credential configured for this tenant")]
    NotConfigured,

    /// The tenant's plan does not include synchronization.
    #[error("Synchronization is not enabled for this plan")]
    IntegrationDisabled,

    /// The tenant used up its sync quota for the current period.
    #[error("Sync quota exhausted: {used} of {quota} used this period")]
    QuotaExceeded { used: i64, quota: i64 },

    /// The case does not exist or belongs to another tenant.
    #[error("Case not found")]
    CaseNotFound,

    /// Provider API failure (already retried at the network level).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider reported the request itself as failed or cancelled.
    #[error("Provider reported request {status}: {message}")]
    RemoteFailure { status: String, message: String },

    /// Database failure; dataset changes roll back, the failed sync record
    /// is still written outside the rolled-back transaction.
    #[error("Persistence error: {0}")]
    Database(#[from] sqlx::Error),

    /// The provider's payload could not be normalized.
    #[error("Normalization failed: {0}")]
    Normalization(String),
}

impl SyncError {
    /// Short machine-readable reason, recorded in `status_reason` and
    /// audit details.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            SyncError::NotConfigured => "credential_missing",
            SyncError::IntegrationDisabled => "integration_disabled",
            SyncError::QuotaExceeded { .. } => "quota_exceeded",
            SyncError::CaseNotFound => "case_not_found",
            SyncError::Provider(ProviderError::PollTimeout { .. }) => "poll_timeout",
            SyncError::Provider(_) => "provider_error",
            SyncError::RemoteFailure { .. } => "provider_failed",
            SyncError::Database(_) => "persistence_error",
            SyncError::Normalization(_) => "normalization_error",
        }
    }

    /// Whether the failure is a policy denial made before any provider
    /// call.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            SyncError::NotConfigured
                | SyncError::IntegrationDisabled
                | SyncError::QuotaExceeded { .. }
        )
    }
}
