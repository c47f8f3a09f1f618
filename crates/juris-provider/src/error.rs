//! Error types for provider API calls.

use thiserror::Error;

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Provider API call errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx response from the provider. Carries the HTTP status and the
    /// raw body for diagnostics.
    #[error("Provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Network-level failure (DNS, connect, timeout, TLS).
    #[error("Provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The poll loop exhausted its attempt budget without reaching a
    /// terminal status. Non-fatal: the sync record stays open for a later
    /// webhook to resolve.
    #[error("Request did not reach a terminal status after {attempts} poll attempts")]
    PollTimeout { attempts: u32 },

    /// The provider returned 2xx but the body could not be interpreted.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a retry may succeed: 429, 5xx, or a transport failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Transport(_) => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
