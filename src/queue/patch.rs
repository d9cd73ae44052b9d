//! Partial updates to a single queue item.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::item::{QueueItem, QueueStatus, deserialize_optional_status};

/// A partial update to one queue item.
///
/// Every field is optional; `None` (absent or JSON `null`) means "not
/// reported" and leaves the current value untouched. Merging is field-level
/// last-write-wins with no version comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueuePatch {
    /// New lifecycle status.
    #[serde(default, deserialize_with = "deserialize_optional_status")]
    pub status: Option<QueueStatus>,
    /// Chapters downloaded so far.
    #[serde(default)]
    pub current_chapter: Option<u32>,
    /// Total chapter count.
    #[serde(default)]
    pub total_chapters: Option<u32>,
    /// Resolved title.
    #[serde(default)]
    pub title: Option<String>,
    /// Resolved author.
    #[serde(default)]
    pub author: Option<String>,
    /// Catalog site.
    #[serde(default)]
    pub site: Option<String>,
    /// Estimated seconds remaining.
    #[serde(default)]
    pub eta_seconds: Option<f64>,
    /// Error text for failed or cancelled items.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl QueuePatch {
    /// A patch that only sets the status.
    #[must_use]
    pub fn status(status: QueueStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A patch that only reports chapter progress.
    #[must_use]
    pub fn chapters(current: u32, total: Option<u32>) -> Self {
        Self {
            current_chapter: Some(current),
            total_chapters: total,
            ..Self::default()
        }
    }

    /// True when the patch reports nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the reported fields into `item` and returns whether it changed.
    ///
    /// Empty strings never overwrite metadata. An error message is only kept
    /// when the resulting status is `failed` or `cancelled`. Applying the
    /// same patch twice yields the same item as applying it once.
    pub fn apply_to(&self, item: &mut QueueItem) -> bool {
        let before = item.clone();

        if let Some(status) = self.status {
            item.set_status(status);
        }
        if let Some(current) = self.current_chapter {
            item.current_chapter = current;
        }
        if let Some(total) = self.total_chapters {
            item.total_chapters = total;
        }
        merge_text(&mut item.title, self.title.as_deref());
        merge_text(&mut item.author, self.author.as_deref());
        merge_text(&mut item.site, self.site.as_deref());
        if let Some(eta) = self.eta_seconds {
            if eta.is_finite() && eta >= 0.0 {
                item.eta_seconds = Some(eta);
            } else {
                trace!(item_id = item.id, eta, "ignoring invalid ETA");
            }
        }
        if let Some(message) = &self.error_message {
            if item.status.carries_error() {
                item.error_message = Some(message.clone());
            } else {
                trace!(item_id = item.id, status = %item.status, "ignoring error message for non-failed item");
            }
        }

        item.normalize();
        *item != before
    }
}

fn merge_text(field: &mut Option<String>, update: Option<&str>) {
    if let Some(value) = update.filter(|v| !v.is_empty()) {
        *field = Some(value.to_string());
    }
}
