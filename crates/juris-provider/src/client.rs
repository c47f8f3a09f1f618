//! Provider HTTP client.
//!
//! All operations are stateless: one request per call, auth header
//! attached, transient failures (429/5xx/transport) retried with
//! exponential backoff and jitter, everything else surfaced immediately as
//! [`ProviderError::Api`] with the raw body.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::types::{RequestInfo, ResponsePage, TrackingInfo};

/// Header carrying the provider API key.
const API_KEY_HEADER: &str = "api-key";

/// Operations against the legal-tracking provider.
///
/// The seam the orchestrator is generic over; tests substitute a mock.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Create a provider-side tracking subscription for a process number.
    async fn create_tracking(
        &self,
        process_number: &str,
        hour_range: Option<&str>,
    ) -> ProviderResult<TrackingInfo>;

    /// Renew an existing tracking subscription.
    async fn renew_tracking(&self, tracking_id: &str) -> ProviderResult<TrackingInfo>;

    /// Submit a new data request for a process number.
    async fn create_request(&self, process_number: &str) -> ProviderResult<RequestInfo>;

    /// Current status of a remote request.
    async fn get_request_status(&self, request_id: &str) -> ProviderResult<RequestInfo>;

    /// One page of results for a completed request.
    async fn fetch_result_page(&self, request_id: &str, page: u32) -> ProviderResult<ResponsePage>;
}

/// Fetch every result page for a request, in order, following
/// `page`/`page_count` until exhausted.
pub async fn fetch_all_results(
    api: &dyn ProviderApi,
    request_id: &str,
) -> ProviderResult<Vec<ResponsePage>> {
    let mut pages = Vec::new();
    let mut page = 1u32;
    loop {
        let result = api.fetch_result_page(request_id, page).await?;
        let has_next = result.has_next();
        let next = result.page + 1;
        pages.push(result);
        if !has_next {
            break;
        }
        page = next;
    }
    Ok(pages)
}

/// Reqwest-backed [`ProviderApi`] implementation.
pub struct ProviderClient {
    config: ProviderConfig,
    client: Client,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("config", &self.config.redacted())
            .finish()
    }
}

impl ProviderClient {
    /// Build a client from configuration.
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Execute one HTTP call with the retry policy applied.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&JsonValue>,
    ) -> ProviderResult<JsonValue> {
        let url = format!("{}{}", self.config.base_url, path);
        let max_attempts = self.config.effective_max_retries().max(1);
        let mut attempt = 1u32;

        loop {
            let mut req = self
                .client
                .request(method.clone(), &url)
                .header(API_KEY_HEADER, &self.config.api_key);
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            let err = match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<JsonValue>()
                            .await
                            .map_err(|e| ProviderError::InvalidResponse(e.to_string()));
                    }
                    let body = response.text().await.unwrap_or_default();
                    ProviderError::Api {
                        status: status.as_u16(),
                        body,
                    }
                }
                Err(e) => ProviderError::Transport(e),
            };

            if !err.is_retryable() || attempt >= max_attempts {
                if attempt > 1 {
                    warn!(path, attempts = attempt, "Provider call failed after retries");
                }
                return Err(err);
            }

            let delay = self.config.backoff_delay(attempt - 1) + self.jitter();
            debug!(
                path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                status = err.status(),
                "Transient provider failure, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Random jitter, strictly below the backoff base so delays stay
    /// strictly increasing across attempts.
    fn jitter(&self) -> Duration {
        let cap = (self.config.backoff_base_ms / 2).max(1);
        Duration::from_millis(rand::thread_rng().gen_range(0..cap))
    }

    fn parse<T: serde::de::DeserializeOwned>(value: JsonValue) -> ProviderResult<T> {
        serde_json::from_value(value).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ProviderApi for ProviderClient {
    async fn create_tracking(
        &self,
        process_number: &str,
        hour_range: Option<&str>,
    ) -> ProviderResult<TrackingInfo> {
        let body = json!({
            "process_number": process_number,
            "hour_range": hour_range,
        });
        let value = self
            .execute(Method::POST, "/tracking", &[], Some(&body))
            .await?;
        Self::parse(value)
    }

    async fn renew_tracking(&self, tracking_id: &str) -> ProviderResult<TrackingInfo> {
        let value = self
            .execute(
                Method::PUT,
                &format!("/tracking/{tracking_id}"),
                &[],
                Some(&json!({})),
            )
            .await?;
        Self::parse(value)
    }

    async fn create_request(&self, process_number: &str) -> ProviderResult<RequestInfo> {
        let body = json!({ "process_number": process_number });
        let value = self
            .execute(Method::POST, "/requests", &[], Some(&body))
            .await?;
        Self::parse(value)
    }

    async fn get_request_status(&self, request_id: &str) -> ProviderResult<RequestInfo> {
        let value = self
            .execute(Method::GET, &format!("/requests/{request_id}"), &[], None)
            .await?;
        Self::parse(value)
    }

    async fn fetch_result_page(&self, request_id: &str, page: u32) -> ProviderResult<ResponsePage> {
        let query = [
            ("request_id", request_id.to_string()),
            ("page", page.to_string()),
            ("page_size", self.config.page_size.to_string()),
        ];
        let value = self
            .execute(Method::GET, "/responses", &query, None)
            .await?;
        Self::parse(value)
    }
}
