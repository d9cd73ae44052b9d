//! The client-side queue table and its merge rules.

use std::collections::HashSet;

use tracing::{debug, info, trace, warn};

use super::error::ActionRejected;
use super::item::{QueueItem, QueueStatus, TerminalStatus};
use super::patch::QueuePatch;
use crate::events::PushEvent;

/// Status message shown while a cancellation is in flight.
pub const CANCELLING_MESSAGE: &str = "Cancelling...";
/// Status message of a confirmed cancellation.
pub const CANCELLED_BY_USER_MESSAGE: &str = "Cancelled by user";

/// Result of merging one update into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The item changed.
    Applied,
    /// The item exists but already held these values.
    Unchanged,
    /// The update was dropped.
    Ignored,
    /// The update names an id this view has never seen; a snapshot is needed to backfill it.
    UnknownItem,
    /// The update was applied and a snapshot refresh should follow.
    RefreshRequested,
}

impl MergeOutcome {
    /// True when the caller should fetch a fresh snapshot.
    #[must_use]
    pub fn needs_refresh(self) -> bool {
        matches!(self, Self::UnknownItem | Self::RefreshRequested)
    }

    /// True when the visible state changed.
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Applied | Self::RefreshRequested)
    }

    fn from_changed(changed: bool) -> Self {
        if changed { Self::Applied } else { Self::Unchanged }
    }
}

/// Kind of user action tracked by an [`ActionTicket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Cancel an active download (speculative status flip applied).
    Cancel,
    /// Delete an inactive item (deferred until confirmed).
    Remove,
    /// Put a failed or cancelled item back in the queue.
    Retry,
}

/// Proof that an action was started; hand it back to
/// [`QueueReconciler::finish_action`] once the backend call resolves.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an action ticket must be finished to release the item"]
pub struct ActionTicket {
    item_id: i64,
    kind: ActionKind,
}

impl ActionTicket {
    /// The target item.
    #[must_use]
    pub fn item_id(&self) -> i64 {
        self.item_id
    }

    /// What the action does.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }
}

/// User-facing message produced by a finished action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The action succeeded.
    Success(String),
    /// The action failed; carries the server's message.
    Error(String),
}

impl Notice {
    /// The message text.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(message) | Self::Error(message) => message,
        }
    }

    /// True for failures.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// What a finished action means for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Message to show the user.
    pub notice: Notice,
    /// True when a snapshot must be fetched to correct a speculative edit.
    pub refetch: bool,
}

/// Items grouped the way the queue view lists them.
#[derive(Debug, Default)]
pub struct QueueGroups<'a> {
    /// `pending`, `fetching`, `downloading`.
    pub active: Vec<&'a QueueItem>,
    /// `failed`, `cancelled`.
    pub failed: Vec<&'a QueueItem>,
    /// `completed`.
    pub completed: Vec<&'a QueueItem>,
}

/// Authoritative in-memory queue view.
///
/// Merges three kinds of input:
/// - full snapshots ([`replace`](Self::replace)), which always win
/// - push patches ([`apply_patch`](Self::apply_patch),
///   [`apply_push`](Self::apply_push)), merged field by field, last write wins
/// - optimistic edits for user actions (`begin_*` / [`finish_action`](Self::finish_action))
///
/// The table has a single owner; callers on other tasks forward their
/// updates to it instead of sharing it.
#[derive(Debug, Default)]
pub struct QueueReconciler {
    items: Vec<QueueItem>,
    in_flight: HashSet<i64>,
    unconfirmed: HashSet<i64>,
    removed: HashSet<i64>,
}

impl QueueReconciler {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items in snapshot order.
    #[must_use]
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn get(&self, item_id: i64) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Number of items in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the view holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True while a user action on `item_id` awaits the backend.
    #[must_use]
    pub fn is_action_pending(&self, item_id: i64) -> bool {
        self.in_flight.contains(&item_id)
    }

    /// Number of actions awaiting the backend.
    #[must_use]
    pub fn pending_action_count(&self) -> usize {
        self.in_flight.len()
    }

    /// True while `item_id` shows a speculative edit no authoritative source has confirmed.
    #[must_use]
    pub fn is_unconfirmed(&self, item_id: i64) -> bool {
        self.unconfirmed.contains(&item_id)
    }

    /// Items grouped into active, failed and completed.
    #[must_use]
    pub fn groups(&self) -> QueueGroups<'_> {
        let mut groups = QueueGroups::default();
        for item in &self.items {
            match item.status {
                QueueStatus::Pending | QueueStatus::Fetching | QueueStatus::Downloading => {
                    groups.active.push(item);
                }
                QueueStatus::Failed | QueueStatus::Cancelled => groups.failed.push(item),
                QueueStatus::Completed => groups.completed.push(item),
            }
        }
        groups
    }

    /// Replaces the whole table with an authoritative snapshot.
    ///
    /// Afterwards the view contains exactly the snapshot's ids. Speculative
    /// edits and removal markers are discarded; in-flight action markers are
    /// kept so redundant actions stay disabled until their calls resolve.
    pub fn replace(&mut self, snapshot: Vec<QueueItem>) {
        let previous = self.items.len();
        let mut seen = HashSet::with_capacity(snapshot.len());
        let mut items = Vec::with_capacity(snapshot.len());
        for mut item in snapshot {
            if !seen.insert(item.id) {
                warn!(item_id = item.id, "duplicate id in queue snapshot, keeping first");
                continue;
            }
            item.normalize();
            items.push(item);
        }
        self.items = items;
        self.unconfirmed.clear();
        self.removed.clear();
        debug!(previous, current = self.items.len(), "queue snapshot applied");
    }

    /// Merges a partial update into the item with `item_id`.
    ///
    /// Unknown ids are dropped; the next snapshot will surface the item.
    pub fn apply_patch(&mut self, item_id: i64, patch: &QueuePatch) -> MergeOutcome {
        if self.removed.contains(&item_id) {
            trace!(item_id, "ignoring patch for removed item");
            return MergeOutcome::Ignored;
        }
        let Some(item) = self.item_mut(item_id) else {
            trace!(item_id, "patch for unknown item");
            return MergeOutcome::UnknownItem;
        };
        let changed = patch.apply_to(item);
        if changed {
            trace!(item_id, status = %item.status, current = item.current_chapter, total = item.total_chapters, "patch applied");
        }
        MergeOutcome::from_changed(changed)
    }

    /// Forces an item into a terminal status, leaving chapter progress alone.
    ///
    /// For `failed`/`cancelled` the message replaces the current one when
    /// given; `completed` clears both the error and the ETA.
    pub fn mark_terminal(
        &mut self,
        item_id: i64,
        status: TerminalStatus,
        error_message: Option<&str>,
    ) -> MergeOutcome {
        if self.removed.contains(&item_id) {
            trace!(item_id, "ignoring terminal update for removed item");
            return MergeOutcome::Ignored;
        }
        let Some(item) = self.item_mut(item_id) else {
            return MergeOutcome::UnknownItem;
        };
        let before = item.clone();
        item.set_status(status.into());
        match status {
            TerminalStatus::Completed => item.eta_seconds = None,
            TerminalStatus::Failed | TerminalStatus::Cancelled => {
                if let Some(message) = error_message {
                    item.error_message = Some(message.to_string());
                }
            }
        }
        MergeOutcome::from_changed(*item != before)
    }

    /// Merges one push event.
    ///
    /// A completed download is marked terminal and requests a refresh so the
    /// final metadata is picked up.
    pub fn apply_push(&mut self, event: &PushEvent) -> MergeOutcome {
        match event {
            PushEvent::QueueUpdate { item_id, patch }
            | PushEvent::DownloadProgress { item_id, patch } => self.apply_patch(*item_id, patch),
            PushEvent::DownloadComplete { item_id, title } => {
                if let Some(title) = title {
                    let patch = QueuePatch {
                        title: Some(title.clone()),
                        ..QueuePatch::default()
                    };
                    self.apply_patch(*item_id, &patch);
                }
                match self.mark_terminal(*item_id, TerminalStatus::Completed, None) {
                    MergeOutcome::Ignored => MergeOutcome::Ignored,
                    MergeOutcome::UnknownItem => MergeOutcome::UnknownItem,
                    _ => MergeOutcome::RefreshRequested,
                }
            }
            PushEvent::DownloadError { item_id, error } => {
                self.mark_terminal(*item_id, TerminalStatus::Failed, Some(error))
            }
        }
    }

    /// Starts a remove action.
    ///
    /// An item being fetched or downloaded is flipped to `cancelled` with
    /// [`CANCELLING_MESSAGE`] immediately. Any other item stays untouched
    /// until the backend confirms the deletion.
    ///
    /// # Errors
    ///
    /// Returns [`ActionRejected`] when the item is unknown or already has an
    /// action in flight.
    pub fn begin_remove(&mut self, item_id: i64) -> Result<ActionTicket, ActionRejected> {
        let status = self.claim(item_id)?;
        let kind = if status.is_cancellable() {
            if let Some(item) = self.item_mut(item_id) {
                item.set_status(QueueStatus::Cancelled);
                item.error_message = Some(CANCELLING_MESSAGE.to_string());
                item.eta_seconds = None;
            }
            self.unconfirmed.insert(item_id);
            ActionKind::Cancel
        } else {
            ActionKind::Remove
        };
        info!(item_id, action = ?kind, "queue action started");
        Ok(ActionTicket { item_id, kind })
    }

    /// Starts a retry action: the item goes back to `pending` with its error cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ActionRejected`] when the item is unknown, busy, or not in a
    /// failed/cancelled state.
    pub fn begin_retry(&mut self, item_id: i64) -> Result<ActionTicket, ActionRejected> {
        let status = self
            .get(item_id)
            .map(|item| item.status)
            .ok_or(ActionRejected::UnknownItem(item_id))?;
        if !status.carries_error() {
            return Err(ActionRejected::NotRetryable {
                id: item_id,
                status,
            });
        }
        self.claim(item_id)?;
        if let Some(item) = self.item_mut(item_id) {
            item.set_status(QueueStatus::Pending);
        }
        self.unconfirmed.insert(item_id);
        info!(item_id, action = ?ActionKind::Retry, "queue action started");
        Ok(ActionTicket {
            item_id,
            kind: ActionKind::Retry,
        })
    }

    /// Completes an action with the backend's answer.
    ///
    /// - cancel ok: `cancelled` / [`CANCELLED_BY_USER_MESSAGE`]
    /// - remove ok: the item is deleted
    /// - retry ok: the optimistic `pending` stands
    /// - cancel/remove failed: a snapshot re-fetch is requested to undo any
    ///   speculative edit
    /// - retry failed: the error is reported and the next poll corrects the status
    pub fn finish_action(
        &mut self,
        ticket: ActionTicket,
        result: Result<(), String>,
    ) -> ActionOutcome {
        let ActionTicket { item_id, kind } = ticket;
        self.in_flight.remove(&item_id);
        self.unconfirmed.remove(&item_id);

        match (kind, result) {
            (ActionKind::Cancel, Ok(())) => {
                if let Some(item) = self.item_mut(item_id) {
                    item.set_status(QueueStatus::Cancelled);
                    item.error_message = Some(CANCELLED_BY_USER_MESSAGE.to_string());
                }
                info!(item_id, "download cancelled");
                ActionOutcome {
                    notice: Notice::Success("Download cancelled".to_string()),
                    refetch: false,
                }
            }
            (ActionKind::Remove, Ok(())) => {
                self.items.retain(|item| item.id != item_id);
                self.removed.insert(item_id);
                info!(item_id, "removed from queue");
                ActionOutcome {
                    notice: Notice::Success("Removed from queue".to_string()),
                    refetch: false,
                }
            }
            (ActionKind::Retry, Ok(())) => {
                info!(item_id, "retry started");
                ActionOutcome {
                    notice: Notice::Success("Retry started".to_string()),
                    refetch: false,
                }
            }
            (ActionKind::Cancel | ActionKind::Remove, Err(message)) => {
                warn!(item_id, error = %message, "remove failed, re-fetching queue");
                ActionOutcome {
                    notice: Notice::Error(message),
                    refetch: true,
                }
            }
            (ActionKind::Retry, Err(message)) => {
                warn!(item_id, error = %message, "retry failed");
                ActionOutcome {
                    notice: Notice::Error(message),
                    refetch: false,
                }
            }
        }
    }

    fn claim(&mut self, item_id: i64) -> Result<QueueStatus, ActionRejected> {
        let status = self
            .get(item_id)
            .map(|item| item.status)
            .ok_or(ActionRejected::UnknownItem(item_id))?;
        if !self.in_flight.insert(item_id) {
            return Err(ActionRejected::AlreadyPending(item_id));
        }
        Ok(status)
    }

    fn item_mut(&mut self, item_id: i64) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }
}
