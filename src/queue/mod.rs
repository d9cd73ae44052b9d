//! Client-side view of the download queue.
//!
//! The queue is owned by the backend; this module keeps a local table in
//! step with it from three sources:
//! - full snapshots fetched on demand or on a poll interval
//! - push patches from the event stream
//! - optimistic edits for user actions, confirmed or corrected later
//!
//! # Overview
//!
//! - [`QueueItem`] - one entry with its progress metadata
//! - [`QueueStatus`] - item lifecycle states
//! - [`QueuePatch`] - a partial update, merged field by field
//! - [`QueueReconciler`] - the table and its merge rules
//! - [`ActionRejected`] - why a user action was refused locally
//!
//! # Example
//!
//! ```
//! use audiobook_core::queue::{QueueItem, QueuePatch, QueueReconciler, QueueStatus};
//!
//! let mut queue = QueueReconciler::new();
//! queue.replace(vec![QueueItem::new(1, "https://example.com/book")]);
//! queue.apply_patch(1, &QueuePatch::status(QueueStatus::Fetching));
//! assert_eq!(queue.get(1).map(|i| i.status), Some(QueueStatus::Fetching));
//! ```

mod error;
mod item;
mod patch;
mod reconciler;

pub use error::ActionRejected;
pub use item::{QueueItem, QueueStatus, TerminalStatus, format_eta};
pub use patch::QueuePatch;
pub use reconciler::{
    ActionKind, ActionOutcome, ActionTicket, CANCELLED_BY_USER_MESSAGE, CANCELLING_MESSAGE,
    MergeOutcome, Notice, QueueGroups, QueueReconciler,
};
