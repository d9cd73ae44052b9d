//! Queue item types and status definitions.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for the worker to pick it up.
    Pending,
    /// Metadata and chapter list are being fetched.
    Fetching,
    /// Chapters are being downloaded.
    Downloading,
    /// All chapters downloaded.
    Completed,
    /// Download failed.
    Failed,
    /// Cancelled by the user.
    Cancelled,
}

impl QueueStatus {
    /// Returns the wire string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// True for `completed`, `failed` and `cancelled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// True while the item still occupies the queue (`pending`, `fetching`, `downloading`).
    #[must_use]
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// True when a worker is currently processing the item.
    ///
    /// Removing such an item cancels the download instead of deleting the row.
    #[must_use]
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Fetching | Self::Downloading)
    }

    /// True for the statuses that carry an error message (`failed`, `cancelled`).
    #[must_use]
    pub fn carries_error(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "fetching" => Ok(Self::Fetching),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid queue status: {s}")),
        }
    }
}

/// The statuses an item can be forced into by [`QueueReconciler::mark_terminal`].
///
/// [`QueueReconciler::mark_terminal`]: super::QueueReconciler::mark_terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped by the user.
    Cancelled,
}

impl From<TerminalStatus> for QueueStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Completed => Self::Completed,
            TerminalStatus::Failed => Self::Failed,
            TerminalStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// One enqueued download as seen by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Backend-assigned identifier; the only merge key.
    pub id: i64,
    /// Source page URL of the audiobook.
    pub url: String,
    /// Title, once metadata has been fetched.
    #[serde(default)]
    pub title: Option<String>,
    /// Author, once metadata has been fetched.
    #[serde(default)]
    pub author: Option<String>,
    /// Catalog site the item came from.
    #[serde(default)]
    pub site: Option<String>,
    /// Current lifecycle status.
    #[serde(deserialize_with = "deserialize_status_or_pending")]
    pub status: QueueStatus,
    /// Chapters downloaded so far.
    #[serde(default)]
    pub current_chapter: u32,
    /// Total chapters; 0 while unknown.
    #[serde(default)]
    pub total_chapters: u32,
    /// Estimated seconds remaining, when the worker reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
    /// Error text; only present for failed or cancelled items.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl QueueItem {
    /// Creates a pending item with no metadata.
    #[must_use]
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: None,
            author: None,
            site: None,
            status: QueueStatus::Pending,
            current_chapter: 0,
            total_chapters: 0,
            eta_seconds: None,
            error_message: None,
        }
    }

    /// Sets the status, clearing the error message when the new status
    /// cannot carry one.
    pub fn set_status(&mut self, status: QueueStatus) {
        self.status = status;
        if !status.carries_error() {
            self.error_message = None;
        }
    }

    /// Restores the item invariants after a merge.
    ///
    /// - `current_chapter <= total_chapters` once the total is known
    /// - no error message outside `failed`/`cancelled`
    /// - ETA is finite and non-negative
    pub fn normalize(&mut self) {
        if self.total_chapters > 0 && self.current_chapter > self.total_chapters {
            debug!(
                item_id = self.id,
                current = self.current_chapter,
                total = self.total_chapters,
                "clamping chapter progress to total"
            );
            self.current_chapter = self.total_chapters;
        }
        if !self.status.carries_error() {
            self.error_message = None;
        }
        if self
            .eta_seconds
            .is_some_and(|eta| !eta.is_finite() || eta < 0.0)
        {
            self.eta_seconds = None;
        }
    }

    /// Chapter progress as a whole percentage; 0 while the total is unknown.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if self.total_chapters == 0 {
            return 0;
        }
        let ratio = f64::from(self.current_chapter.min(self.total_chapters))
            / f64::from(self.total_chapters);
        // ratio is within 0.0..=1.0, so the rounded percentage fits in u8
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (ratio * 100.0).round() as u8;
        percent
    }

    /// Title for display, or a placeholder while metadata is being fetched.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Fetching...")
    }

    /// Secondary line for display: author, else site, else the URL host.
    #[must_use]
    pub fn subtitle(&self) -> String {
        self.author
            .as_deref()
            .filter(|a| !a.is_empty())
            .or_else(|| self.site.as_deref().filter(|s| !s.is_empty()))
            .map_or_else(|| url_host(&self.url), ToString::to_string)
    }

    /// Human-readable remaining time, when an ETA is known.
    #[must_use]
    pub fn eta_text(&self) -> Option<String> {
        self.eta_seconds.map(format_eta)
    }
}

impl fmt::Display for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueItem {{ id: {}, url: {}, status: {} }}",
            self.id, self.url, self.status
        )
    }
}

/// Formats a remaining-time estimate the way the queue view shows it.
#[must_use]
pub fn format_eta(seconds: f64) -> String {
    if seconds < 60.0 {
        return "< 1 min remaining".to_string();
    }
    // Non-negative, and far below u64::MAX for any realistic ETA.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = seconds as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m remaining")
    } else {
        format!("{minutes}m remaining")
    }
}

fn url_host(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
        .unwrap_or_else(|| raw.to_string())
}

fn deserialize_status_or_pending<'de, D>(deserializer: D) -> Result<QueueStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|_| {
        warn!(status = %raw, "unrecognized queue status, treating as pending");
        QueueStatus::Pending
    }))
}

/// Lenient status field for partial updates: unknown values are dropped.
pub(crate) fn deserialize_optional_status<'de, D>(
    deserializer: D,
) -> Result<Option<QueueStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value.parse() {
        Ok(status) => Some(status),
        Err(_) => {
            if !value.is_empty() {
                warn!(status = %value, "ignoring unrecognized status in update");
            }
            None
        }
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== QueueStatus Tests ====================

    #[test]
    fn test_queue_status_as_str_round_trips_through_from_str() {
        for status in [
            QueueStatus::Pending,
            QueueStatus::Fetching,
            QueueStatus::Downloading,
            QueueStatus::Completed,
            QueueStatus::Failed,
            QueueStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<QueueStatus>().unwrap(), status);
            assert_eq!(status.to_string(), status.as_str());
        }
    }

    #[test]
    fn test_queue_status_from_str_invalid() {
        let result: Result<QueueStatus, _> = "in_progress".parse();
        assert!(result.unwrap_err().contains("invalid queue status"));
    }

    #[test]
    fn test_queue_status_classification() {
        assert!(QueueStatus::Downloading.is_cancellable());
        assert!(QueueStatus::Fetching.is_cancellable());
        assert!(!QueueStatus::Pending.is_cancellable());
        assert!(QueueStatus::Pending.is_active());
        assert!(QueueStatus::Cancelled.is_terminal());
        assert!(QueueStatus::Failed.carries_error());
        assert!(!QueueStatus::Completed.carries_error());
    }

    // ==================== QueueItem Tests ====================

    #[test]
    fn test_queue_item_deserializes_snapshot_row_with_extra_fields() {
        let json = r#"{
            "id": 7, "url": "https://example.com/book", "title": "Dune",
            "author": null, "narrator": "Someone", "site": "tokybook",
            "cover_url": null, "status": "downloading", "current_chapter": 3,
            "total_chapters": 12, "error_message": null,
            "created_at": "2024-01-01T00:00:00", "started_at": null, "completed_at": null
        }"#;
        let item: QueueItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, 7);
        assert_eq!(item.status, QueueStatus::Downloading);
        assert_eq!(item.current_chapter, 3);
        assert_eq!(item.total_chapters, 12);
        assert!(item.eta_seconds.is_none());
    }

    #[test]
    fn test_queue_item_unknown_status_falls_back_to_pending() {
        let item: QueueItem =
            serde_json::from_str(r#"{"id":1,"url":"u","status":"paused"}"#).unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
    }

    #[test]
    fn test_set_status_clears_error_outside_failure_states() {
        let mut item = QueueItem::new(1, "https://example.com");
        item.set_status(QueueStatus::Failed);
        item.error_message = Some("boom".into());
        item.set_status(QueueStatus::Cancelled);
        assert_eq!(item.error_message.as_deref(), Some("boom"));
        item.set_status(QueueStatus::Pending);
        assert!(item.error_message.is_none());
    }

    #[test]
    fn test_normalize_clamps_chapters_and_drops_stray_error() {
        let mut item = QueueItem::new(1, "https://example.com");
        item.status = QueueStatus::Downloading;
        item.current_chapter = 14;
        item.total_chapters = 10;
        item.error_message = Some("stale".into());
        item.eta_seconds = Some(-5.0);
        item.normalize();
        assert_eq!(item.current_chapter, 10);
        assert!(item.error_message.is_none());
        assert!(item.eta_seconds.is_none());
    }

    #[test]
    fn test_normalize_keeps_progress_when_total_unknown() {
        let mut item = QueueItem::new(1, "https://example.com");
        item.current_chapter = 4;
        item.normalize();
        assert_eq!(item.current_chapter, 4);
    }

    #[test]
    fn test_progress_percent() {
        let mut item = QueueItem::new(1, "https://example.com");
        assert_eq!(item.progress_percent(), 0);
        item.total_chapters = 3;
        item.current_chapter = 1;
        assert_eq!(item.progress_percent(), 33);
        item.current_chapter = 2;
        assert_eq!(item.progress_percent(), 67);
        item.current_chapter = 3;
        assert_eq!(item.progress_percent(), 100);
    }

    #[test]
    fn test_display_title_and_subtitle_fallbacks() {
        let mut item = QueueItem::new(1, "https://tokybook.com/some-book");
        assert_eq!(item.display_title(), "Fetching...");
        assert_eq!(item.subtitle(), "tokybook.com");
        item.site = Some("tokybook".into());
        assert_eq!(item.subtitle(), "tokybook");
        item.author = Some("Frank Herbert".into());
        item.title = Some("Dune".into());
        assert_eq!(item.subtitle(), "Frank Herbert");
        assert_eq!(item.display_title(), "Dune");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(12.0), "< 1 min remaining");
        assert_eq!(format_eta(125.0), "2m remaining");
        assert_eq!(format_eta(3_720.0), "1h 2m remaining");
    }

    #[test]
    fn test_queue_item_display() {
        let item = QueueItem::new(3, "https://example.com/a");
        assert_eq!(
            item.to_string(),
            "QueueItem { id: 3, url: https://example.com/a, status: pending }"
        );
    }
}
