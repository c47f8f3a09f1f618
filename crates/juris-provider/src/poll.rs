//! Polling helper for remote request status.

use std::time::Duration;
use tracing::debug;

use crate::client::ProviderApi;
use crate::error::{ProviderError, ProviderResult};
use crate::types::RequestInfo;

/// Poll `get_request_status` on a fixed interval until the request reaches
/// a terminal status or the attempt budget runs out.
///
/// On budget exhaustion this returns [`ProviderError::PollTimeout`]; the
/// caller decides whether to leave the sync record open for a later
/// webhook to resolve. The sleep between attempts is the only intentional
/// blocking wait in the sync flow and is cancellable with the owning task.
pub async fn poll_until_terminal(
    api: &dyn ProviderApi,
    request_id: &str,
    interval: Duration,
    max_attempts: u32,
) -> ProviderResult<RequestInfo> {
    for attempt in 1..=max_attempts {
        let info = api.get_request_status(request_id).await?;
        if info.status.is_terminal() {
            debug!(
                request_id,
                attempt,
                status = info.status.as_str(),
                "Request reached terminal status"
            );
            return Ok(info);
        }
        debug!(
            request_id,
            attempt,
            status = info.status.as_str(),
            "Request still in flight"
        );
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(ProviderError::PollTimeout {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RequestStatus, ResponsePage, TrackingInfo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock that reports `processing` a fixed number of times before
    /// `completed`.
    struct ScriptedApi {
        pending_polls: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderApi for ScriptedApi {
        async fn create_tracking(
            &self,
            _process_number: &str,
            _hour_range: Option<&str>,
        ) -> ProviderResult<TrackingInfo> {
            unimplemented!()
        }

        async fn renew_tracking(&self, _tracking_id: &str) -> ProviderResult<TrackingInfo> {
            unimplemented!()
        }

        async fn create_request(&self, _process_number: &str) -> ProviderResult<RequestInfo> {
            unimplemented!()
        }

        async fn get_request_status(&self, request_id: &str) -> ProviderResult<RequestInfo> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let status = if n < self.pending_polls {
                RequestStatus::Processing
            } else {
                RequestStatus::Completed
            };
            Ok(RequestInfo {
                request_id: request_id.to_string(),
                status,
                message: None,
            })
        }

        async fn fetch_result_page(
            &self,
            _request_id: &str,
            _page: u32,
        ) -> ProviderResult<ResponsePage> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn resolves_after_pending_polls() {
        let api = ScriptedApi {
            pending_polls: 2,
            calls: AtomicUsize::new(0),
        };
        let info = poll_until_terminal(&api, "r1", Duration::from_millis(1), 10)
            .await
            .unwrap();
        assert_eq!(info.status, RequestStatus::Completed);
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_after_budget() {
        let api = ScriptedApi {
            pending_polls: usize::MAX,
            calls: AtomicUsize::new(0),
        };
        let err = poll_until_terminal(&api, "r1", Duration::from_millis(1), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::PollTimeout { attempts: 4 }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 4);
    }
}
