//! Typed push events and their decoding from named server-sent events.

use serde::Deserialize;
use tracing::{trace, warn};

use super::frame::SseFrame;
use crate::queue::QueuePatch;

/// Event name of a queue item field update.
pub const QUEUE_UPDATE: &str = "queue_update";
/// Event name of a chapter progress update.
pub const DOWNLOAD_PROGRESS: &str = "download_progress";
/// Event name of a finished download.
pub const DOWNLOAD_COMPLETE: &str = "download_complete";
/// Event name of a failed download.
pub const DOWNLOAD_ERROR: &str = "download_error";
/// Event name of the server keep-alive.
pub const PING: &str = "ping";
/// Event name used for frames without an `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// Message shown when a failure event carries no error text.
const DEFAULT_ERROR_MESSAGE: &str = "Download failed";

/// A queue notification pushed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Item fields changed (status, metadata, error).
    QueueUpdate {
        /// Affected queue item.
        item_id: i64,
        /// Reported fields.
        patch: QueuePatch,
    },
    /// Chapter progress changed.
    DownloadProgress {
        /// Affected queue item.
        item_id: i64,
        /// Reported fields.
        patch: QueuePatch,
    },
    /// The download finished successfully.
    DownloadComplete {
        /// Affected queue item.
        item_id: i64,
        /// Final title, when reported.
        title: Option<String>,
    },
    /// The download failed.
    DownloadError {
        /// Affected queue item.
        item_id: i64,
        /// Failure description.
        error: String,
    },
}

impl PushEvent {
    /// The queue item this event refers to.
    #[must_use]
    pub fn item_id(&self) -> i64 {
        match self {
            Self::QueueUpdate { item_id, .. }
            | Self::DownloadProgress { item_id, .. }
            | Self::DownloadComplete { item_id, .. }
            | Self::DownloadError { item_id, .. } => *item_id,
        }
    }

    /// The wire event name this event was decoded from.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::QueueUpdate { .. } => QUEUE_UPDATE,
            Self::DownloadProgress { .. } => DOWNLOAD_PROGRESS,
            Self::DownloadComplete { .. } => DOWNLOAD_COMPLETE,
            Self::DownloadError { .. } => DOWNLOAD_ERROR,
        }
    }
}

#[derive(Deserialize)]
struct PatchPayload {
    queue_id: i64,
    #[serde(flatten)]
    patch: QueuePatch,
}

#[derive(Deserialize)]
struct CompletePayload {
    queue_id: i64,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    queue_id: i64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

impl ErrorPayload {
    fn into_message(self) -> String {
        [self.error, self.error_message]
            .into_iter()
            .flatten()
            .find(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string())
    }
}

/// Decodes one server-sent event into a [`PushEvent`].
///
/// Each event name is decoded independently. Keep-alives, unknown names and
/// malformed bodies yield `None`; a bad message never affects the next one.
/// Frames without an event name are treated as `queue_update`.
#[must_use]
pub fn decode_push_event(frame: &SseFrame) -> Option<PushEvent> {
    match frame.event.as_str() {
        QUEUE_UPDATE | DEFAULT_EVENT => parse::<PatchPayload>(frame)
            .map(|p| PushEvent::QueueUpdate {
                item_id: p.queue_id,
                patch: p.patch,
            }),
        DOWNLOAD_PROGRESS => parse::<PatchPayload>(frame).map(|p| PushEvent::DownloadProgress {
            item_id: p.queue_id,
            patch: p.patch,
        }),
        DOWNLOAD_COMPLETE => {
            parse::<CompletePayload>(frame).map(|p| PushEvent::DownloadComplete {
                item_id: p.queue_id,
                title: p.title.filter(|t| !t.is_empty()),
            })
        }
        DOWNLOAD_ERROR => parse::<ErrorPayload>(frame).map(|p| PushEvent::DownloadError {
            item_id: p.queue_id,
            error: p.into_message(),
        }),
        PING => None,
        other => {
            trace!(event = %other, "ignoring unknown push event");
            None
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(frame: &SseFrame) -> Option<T> {
    match serde_json::from_str(&frame.data) {
        Ok(payload) => Some(payload),
        Err(error) => {
            warn!(event = %frame.event, error = %error, "dropping malformed push event");
            None
        }
    }
}
