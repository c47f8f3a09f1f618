//! Provider client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on retry attempts, whatever the configuration says.
pub const MAX_RETRY_CEILING: u32 = 8;

/// Configuration for [`crate::ProviderClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider base URL, no trailing slash.
    pub base_url: String,

    /// Static API key sent on every request.
    pub api_key: String,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Per-request read timeout in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Total attempt budget for 429/5xx/transport failures (clamped to
    /// [`MAX_RETRY_CEILING`]): a persistently failing call is made exactly
    /// this many times before the error surfaces.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Interval between status polls, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Poll attempts before giving up with a timeout.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Page size for result pagination.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_poll_max_attempts() -> u32 {
    24
}

fn default_page_size() -> u32 {
    20
}

impl ProviderConfig {
    /// Config with defaults for everything but endpoint and key.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_max_attempts: default_poll_max_attempts(),
            page_size: default_page_size(),
        }
    }

    /// Set retry attempts (clamped to the safe ceiling).
    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max.min(MAX_RETRY_CEILING);
        self
    }

    /// Set the backoff base delay.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, ms: u64) -> Self {
        self.backoff_base_ms = ms;
        self
    }

    /// Set the poll cadence.
    #[must_use]
    pub fn with_polling(mut self, interval_secs: u64, max_attempts: u32) -> Self {
        self.poll_interval_secs = interval_secs;
        self.poll_max_attempts = max_attempts;
        self
    }

    /// Effective retry budget after clamping.
    #[must_use]
    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.min(MAX_RETRY_CEILING)
    }

    /// Backoff delay for a given zero-based attempt: base × 2^attempt.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    /// Debug representation with the API key masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        format!(
            "ProviderConfig {{ base_url: {}, api_key: ***, max_retries: {} }}",
            self.base_url,
            self.effective_max_retries()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_are_clamped() {
        let cfg = ProviderConfig::new("https://api.example.com", "k").with_max_retries(50);
        assert_eq!(cfg.effective_max_retries(), MAX_RETRY_CEILING);
    }

    #[test]
    fn backoff_is_exponential() {
        let cfg = ProviderConfig::new("https://api.example.com", "k").with_backoff_base_ms(100);
        assert_eq!(cfg.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(cfg.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(cfg.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn redacted_hides_key() {
        let cfg = ProviderConfig::new("https://api.example.com", "secret");
        assert!(!cfg.redacted().contains("secret"));
    }
}
