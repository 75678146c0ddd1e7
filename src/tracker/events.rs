//! Wire format for scrape progress events.
//!
//! The backend pushes one JSON object per WebSocket text frame:
//! `{"type": string, "data": object, "timestamp": string}`. Nothing else is
//! a valid inbound frame; text that fails this parse is dropped by the
//! tracker with a diagnostic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Recognized `type` values. The set is open: unknown types are still
/// recorded in the event log, they just don't move any counters.
pub mod kind {
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const PAGE_DISCOVERED: &str = "page_discovered";
    pub const PAGE_SCRAPED: &str = "page_scraped";
    pub const PAGE_FAILED: &str = "page_failed";
    pub const ERROR: &str = "error";
}

/// One progress event as received from the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeEvent {
    /// Event type, open string set (see [`kind`]).
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form payload; shape depends on `kind`.
    pub data: Map<String, Value>,
    /// Emission time as reported by the backend, carried verbatim.
    /// The backend sends naive ISO-8601 strings.
    pub timestamp: String,
}

impl ScrapeEvent {
    /// Parse one inbound text frame. `data` must be a JSON object and all
    /// three top-level fields must be present; extra fields are ignored.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// String field accessor into the payload.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_frame() {
        let text = r#"{"type":"page_scraped","data":{"url":"https://a/1","title":"A"},"timestamp":"2024-05-01T10:00:00"}"#;
        let event = ScrapeEvent::parse(text).unwrap();

        assert_eq!(event.kind, kind::PAGE_SCRAPED);
        assert_eq!(event.data_str("url"), Some("https://a/1"));
        assert_eq!(event.timestamp, "2024-05-01T10:00:00");
    }

    #[test]
    fn rejects_non_json() {
        assert!(ScrapeEvent::parse("not json").is_err());
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(ScrapeEvent::parse(r#"{"type":"error"}"#).is_err());
        assert!(ScrapeEvent::parse(r#"{"data":{},"timestamp":"t"}"#).is_err());
    }

    #[test]
    fn rejects_non_object_data() {
        let text = r#"{"type":"error","data":"boom","timestamp":"t"}"#;
        assert!(ScrapeEvent::parse(text).is_err());
    }

    #[test]
    fn ignores_unknown_extra_fields() {
        let text = r#"{"type":"status_changed","data":{"status":"running"},"timestamp":"t","seq":9}"#;
        let event = ScrapeEvent::parse(text).unwrap();
        assert_eq!(event.data_str("status"), Some("running"));
    }
}
