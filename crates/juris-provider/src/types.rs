//! Wire types for the provider API.
//!
//! The provider's payloads are dynamically shaped and have drifted over
//! time, so deserialization is deliberately tolerant: unknown enum values
//! fall through to [`RequestStatus::Unknown`], and response entries keep
//! their data as raw JSON for the normalizer to interpret.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Response-type tag for a lawsuit entry.
pub const RESPONSE_TYPE_LAWSUIT: &str = "lawsuit";

/// A provider-side tracking subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub tracking_id: String,
    #[serde(default)]
    pub hour_range: Option<String>,
}

/// Remote request status, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    #[serde(alias = "started")]
    Processing,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl RequestStatus {
    /// Whether the request has ended on the provider side.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// snake_case string form, matching the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

/// A remote request, as returned by `POST /requests` and
/// `GET /requests/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
    pub request_id: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// One entry from a result page.
///
/// Known kinds form a small tagged union keyed on `response_type`; anything
/// else is carried through as an opaque entry so new provider kinds never
/// break ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEntry {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub response_data: JsonValue,
}

impl ResponseEntry {
    /// Whether this entry carries a lawsuit payload.
    #[must_use]
    pub fn is_lawsuit(&self) -> bool {
        self.response_type.as_deref() == Some(RESPONSE_TYPE_LAWSUIT)
    }

    /// The process number claimed by the entry, under any of the provider's
    /// historical keys.
    #[must_use]
    pub fn process_number(&self) -> Option<&str> {
        for key in ["code", "process_number", "lawsuit_cnj", "number"] {
            if let Some(n) = self.response_data.get(key).and_then(JsonValue::as_str) {
                return Some(n);
            }
        }
        None
    }
}

/// One page of `GET /responses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePage {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page")]
    pub page_count: u32,
    #[serde(default)]
    pub page_data: Vec<ResponseEntry>,
}

fn default_page() -> u32 {
    1
}

impl ResponsePage {
    /// Whether another page follows this one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_status_does_not_fail() {
        let info: RequestInfo =
            serde_json::from_value(json!({"request_id": "r1", "status": "queued"})).unwrap();
        assert_eq!(info.status, RequestStatus::Unknown);
        assert!(!info.status.is_terminal());
    }

    #[test]
    fn started_aliases_processing() {
        let s: RequestStatus = serde_json::from_value(json!("started")).unwrap();
        assert_eq!(s, RequestStatus::Processing);
    }

    #[test]
    fn entry_number_tolerates_key_variants() {
        let entry: ResponseEntry = serde_json::from_value(json!({
            "response_type": "lawsuit",
            "response_data": {"lawsuit_cnj": "0000001-11.2024.1.11.0001"}
        }))
        .unwrap();
        assert!(entry.is_lawsuit());
        assert_eq!(entry.process_number(), Some("0000001-11.2024.1.11.0001"));
    }

    #[test]
    fn page_iteration_bound() {
        let page: ResponsePage =
            serde_json::from_value(json!({"page": 2, "page_count": 2, "page_data": []})).unwrap();
        assert!(!page.has_next());
    }
}
