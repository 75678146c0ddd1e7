//! Per-job progress snapshots and the event reducer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::events::{ScrapeEvent, kind};

/// Well-known `JobProgress::status` values. The status set is open: the
/// backend is the source of truth for business states and whatever it puts
/// in a `status_changed` event is forwarded verbatim.
pub mod status {
    /// Connection requested, not yet open.
    pub const CONNECTING: &str = "connecting";
    /// Stream is open; no business status received yet.
    pub const CONNECTED: &str = "connected";
    /// Connect failure, transport error, or backend-reported error.
    pub const ERROR: &str = "error";

    // Backend-reported states the CLI treats as terminal.
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
    pub const CANCELLED: &str = "cancelled";
}

/// Aggregated live progress for one tracked job.
///
/// Counters are monotonically non-decreasing for the life of one tracking
/// session; `progress` is derived from the counters on every `page_scraped`
/// event and never computed with a zero denominator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub job_id: String,
    pub status: String,
    pub pages_discovered: u64,
    pub pages_scraped: u64,
    pub pages_failed: u64,
    pub current_url: Option<String>,
    /// Completion percentage in [0, 100].
    pub progress: f64,
}

impl JobProgress {
    /// Fresh snapshot for a job whose connection was just requested.
    pub fn connecting(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: status::CONNECTING.to_string(),
            pages_discovered: 0,
            pages_scraped: 0,
            pages_failed: 0,
            current_url: None,
            progress: 0.0,
        }
    }

    /// Apply one event to this snapshot.
    ///
    /// Recognized events with a payload missing the field the mutation
    /// needs leave the snapshot untouched (diagnostic only). Unrecognized
    /// kinds are a no-op here; the event log still records them.
    pub(crate) fn apply(&mut self, event: &ScrapeEvent) {
        match event.kind.as_str() {
            kind::STATUS_CHANGED => match event.data_str("status") {
                Some(s) => self.status = s.to_string(),
                None => debug!(job_id = %self.job_id, "status_changed without data.status"),
            },
            kind::PAGE_DISCOVERED => match event.data_str("url") {
                Some(url) => {
                    self.pages_discovered += 1;
                    self.current_url = Some(url.to_string());
                }
                None => debug!(job_id = %self.job_id, "page_discovered without data.url"),
            },
            kind::PAGE_SCRAPED => match event.data_str("url") {
                Some(url) => {
                    self.pages_scraped += 1;
                    self.current_url = Some(url.to_string());
                    if self.pages_discovered > 0 {
                        self.progress =
                            self.pages_scraped as f64 / self.pages_discovered as f64 * 100.0;
                    }
                }
                None => debug!(job_id = %self.job_id, "page_scraped without data.url"),
            },
            kind::PAGE_FAILED => self.pages_failed += 1,
            kind::ERROR => self.status = status::ERROR.to_string(),
            other => debug!(job_id = %self.job_id, kind = other, "unrecognized event kind"),
        }
    }

    /// Merge an external partial update; only supplied fields change.
    pub(crate) fn merge(&mut self, update: ProgressUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(n) = update.pages_discovered {
            self.pages_discovered = n;
        }
        if let Some(n) = update.pages_scraped {
            self.pages_scraped = n;
        }
        if let Some(n) = update.pages_failed {
            self.pages_failed = n;
        }
        if let Some(url) = update.current_url {
            self.current_url = Some(url);
        }
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
    }
}

/// Caller-driven correction applied outside the event stream.
///
/// Every field is optional; unset fields are left untouched. No validation
/// beyond the field types: this is a deliberate escape hatch (e.g. seeding
/// counters from a job fetched over HTTP before the stream opens).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressUpdate {
    pub status: Option<String>,
    pub pages_discovered: Option<u64>,
    pub pages_scraped: Option<u64>,
    pub pages_failed: Option<u64>,
    pub current_url: Option<String>,
    pub progress: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: &str, data: serde_json::Value) -> ScrapeEvent {
        ScrapeEvent {
            kind: kind.to_string(),
            data: data.as_object().cloned().unwrap_or_default(),
            timestamp: "2024-05-01T10:00:00".to_string(),
        }
    }

    #[test]
    fn counters_never_decrease() {
        let mut progress = JobProgress::connecting("j1");
        let events = [
            event(kind::PAGE_DISCOVERED, json!({"url": "https://a"})),
            event(kind::PAGE_SCRAPED, json!({"url": "https://a"})),
            event(kind::PAGE_FAILED, json!({})),
            event(kind::PAGE_DISCOVERED, json!({"url": "https://b"})),
            event(kind::PAGE_SCRAPED, json!({"url": "https://b"})),
        ];

        let mut last = (0, 0, 0);
        for e in &events {
            progress.apply(e);
            let now = (
                progress.pages_discovered,
                progress.pages_scraped,
                progress.pages_failed,
            );
            assert!(now.0 >= last.0 && now.1 >= last.1 && now.2 >= last.2);
            last = now;
        }
        assert_eq!(last, (2, 2, 1));
    }

    #[test]
    fn progress_derived_on_page_scraped() {
        let mut progress = JobProgress::connecting("j1");
        for _ in 0..4 {
            progress.apply(&event(kind::PAGE_DISCOVERED, json!({"url": "https://a"})));
        }
        progress.apply(&event(kind::PAGE_SCRAPED, json!({"url": "https://a/1"})));

        assert_eq!(progress.pages_discovered, 4);
        assert_eq!(progress.pages_scraped, 1);
        assert!((progress.progress - 25.0).abs() < 1e-9);
    }

    #[test]
    fn zero_discovered_leaves_progress_unchanged() {
        let mut progress = JobProgress::connecting("j1");
        // Scrape reported before any discovery: no division, no change.
        progress.apply(&event(kind::PAGE_SCRAPED, json!({"url": "https://a"})));

        assert_eq!(progress.pages_scraped, 1);
        assert_eq!(progress.progress, 0.0);
    }

    #[test]
    fn status_forwarded_verbatim() {
        let mut progress = JobProgress::connecting("j1");
        progress.apply(&event(kind::STATUS_CHANGED, json!({"status": "paused"})));
        assert_eq!(progress.status, "paused");

        progress.apply(&event(kind::ERROR, json!({"message": "boom"})));
        assert_eq!(progress.status, status::ERROR);
    }

    #[test]
    fn missing_payload_field_mutates_nothing() {
        let mut progress = JobProgress::connecting("j1");
        let before = progress.clone();

        progress.apply(&event(kind::STATUS_CHANGED, json!({})));
        progress.apply(&event(kind::PAGE_DISCOVERED, json!({"depth": 2})));
        progress.apply(&event(kind::PAGE_SCRAPED, json!({})));

        assert_eq!(progress, before);
    }

    #[test]
    fn unrecognized_kind_is_noop() {
        let mut progress = JobProgress::connecting("j1");
        let before = progress.clone();
        progress.apply(&event("crawl_paused", json!({"reason": "rate limit"})));
        assert_eq!(progress, before);
    }

    #[test]
    fn merge_touches_only_supplied_fields() {
        let mut progress = JobProgress::connecting("j1");
        progress.merge(ProgressUpdate {
            status: Some("running".to_string()),
            pages_discovered: Some(10),
            ..Default::default()
        });

        assert_eq!(progress.status, "running");
        assert_eq!(progress.pages_discovered, 10);
        assert_eq!(progress.pages_scraped, 0);
        assert_eq!(progress.current_url, None);
    }
}
