//! Error types for the sync API.
//!
//! Every denial the engine can produce maps to its own HTTP status so
//! callers can tell "buy more quota" from "fix your credentials" without
//! parsing messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use juris_provider::ProviderError;
use juris_sync::SyncError;

/// Sync API error variants.
#[derive(Debug, thiserror::Error)]
pub enum SyncApiError {
    #[error("Missing or invalid tenant credentials")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<sqlx::Error> for SyncApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Sync(SyncError::Database(err))
    }
}

/// JSON error response returned by sync API endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl SyncApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            SyncApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            SyncApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            SyncApiError::Sync(err) => match err {
                SyncError::NotConfigured => {
                    (StatusCode::CONFLICT, "integration_not_configured")
                }
                SyncError::IntegrationDisabled => {
                    (StatusCode::FORBIDDEN, "integration_disabled")
                }
                SyncError::QuotaExceeded { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded")
                }
                SyncError::CaseNotFound => (StatusCode::NOT_FOUND, "case_not_found"),
                SyncError::Provider(ProviderError::PollTimeout { .. }) => {
                    (StatusCode::GATEWAY_TIMEOUT, "poll_timeout")
                }
                SyncError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
                SyncError::RemoteFailure { .. } => (StatusCode::BAD_GATEWAY, "provider_failed"),
                SyncError::Normalization(_) => (StatusCode::BAD_GATEWAY, "normalization_error"),
                SyncError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error")
                }
            },
        }
    }
}

impl IntoResponse for SyncApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, SyncApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denials_get_distinct_statuses() {
        let cases = [
            (
                SyncApiError::Sync(SyncError::QuotaExceeded { used: 5, quota: 5 }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                SyncApiError::Sync(SyncError::IntegrationDisabled),
                StatusCode::FORBIDDEN,
            ),
            (
                SyncApiError::Sync(SyncError::NotConfigured),
                StatusCode::CONFLICT,
            ),
            (
                SyncApiError::Sync(SyncError::CaseNotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                SyncApiError::Sync(SyncError::RemoteFailure {
                    status: "failed".into(),
                    message: "boom".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_type().0, expected, "{err}");
        }
    }

    #[test]
    fn provider_failures_are_never_generic_500() {
        let err = SyncApiError::Sync(SyncError::Provider(ProviderError::Api {
            status: 503,
            body: "unavailable".into(),
        }));
        assert_ne!(err.status_and_type().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
