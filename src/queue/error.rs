//! Error types for queue actions.

use thiserror::Error;

use super::item::QueueStatus;

/// Reasons a user action is refused before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejected {
    /// The item is not in the local queue view.
    #[error(
        "queue item not found: id {0}\n  Suggestion: The item may have been removed; refresh the queue"
    )]
    UnknownItem(i64),

    /// Another action on the same item has not finished yet.
    #[error("an action is already in progress for queue item {0}")]
    AlreadyPending(i64),

    /// Retry was requested for an item that has not failed.
    #[error(
        "queue item {id} cannot be retried while {status}\n  Suggestion: Only failed or cancelled downloads can be retried"
    )]
    NotRetryable {
        /// The item id.
        id: i64,
        /// Its current status.
        status: QueueStatus,
    },
}
