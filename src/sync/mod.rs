//! Keeps a [`QueueReconciler`](crate::queue::QueueReconciler) in step with
//! the backend from a single owning task.

mod watcher;

pub use watcher::{MIN_POLL_INTERVAL, QueueWatcher, WatchCommand, WatcherHandle};
