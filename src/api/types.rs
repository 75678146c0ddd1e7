//! Response types for the job-control API.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-side job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    /// Forward compatibility: states added server-side after this build.
    #[serde(other)]
    Unknown,
}

impl ScrapeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One scrape job as returned by the backend.
///
/// Timestamps are naive ISO-8601 strings in the backend's clock (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: Uuid,
    pub project_id: Uuid,
    pub status: ScrapeStatus,
    pub pages_discovered: u64,
    pub pages_scraped: u64,
    pub pages_failed: u64,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_response() {
        let json = r#"{
            "id": "0c6a8a54-5b47-4df0-9f9e-2a8f3a1f1f10",
            "project_id": "7e6c1e0a-0d5f-4e52-8c7b-51a3f9f3b2e4",
            "status": "running",
            "pages_discovered": 12,
            "pages_scraped": 8,
            "pages_failed": 1,
            "started_at": "2024-05-01T10:00:00",
            "completed_at": null,
            "error_message": null,
            "created_at": "2024-05-01T09:59:58.123456"
        }"#;

        let job: ScrapeJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, ScrapeStatus::Running);
        assert_eq!(job.pages_scraped, 8);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn unknown_status_is_forward_compatible() {
        let status: ScrapeStatus = serde_json::from_str(r#""archived""#).unwrap();
        assert_eq!(status, ScrapeStatus::Unknown);
        assert!(!status.is_terminal());
    }

    #[test]
    fn terminal_states() {
        assert!(ScrapeStatus::Completed.is_terminal());
        assert!(ScrapeStatus::Failed.is_terminal());
        assert!(ScrapeStatus::Cancelled.is_terminal());
        assert!(!ScrapeStatus::Running.is_terminal());
        assert!(!ScrapeStatus::Pending.is_terminal());
    }
}
