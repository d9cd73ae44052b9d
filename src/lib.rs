//! Audiobook Downloader Client Library
//!
//! Client side of a self-hosted audiobook downloader: catalog search with
//! live per-site progress, and a download queue kept in sync with the
//! backend through snapshots, push events and optimistic user actions.
//!
//! # Architecture
//!
//! - [`stream`] - chunk-to-record decoding of `data: <json>` bodies
//! - [`search`] - the streamed search state machine
//! - [`events`] - server-sent event subscription with reconnect
//! - [`queue`] - queue items, patches and the reconciling table
//! - [`sync`] - the single-owner loop that drives the table
//! - [`api`] - REST client and the backend traits the above depend on
//! - [`config`] - connection settings
//! - [`input`] - URL extraction and result selection parsing

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod events;
pub mod input;
pub mod queue;
pub mod search;
pub mod stream;
pub mod sync;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, QueueBackend, SearchBackend, SearchRequest, SearchResult};
pub use config::{ClientConfig, ConfigError};
pub use events::{EventStreamClient, PushEvent, Subscription};
pub use input::{InputError, extract_urls, parse_selection, require_urls};
pub use queue::{
    ActionRejected, Notice, QueueItem, QueuePatch, QueueReconciler, QueueStatus, TerminalStatus,
};
pub use search::{SearchController, SearchError, SearchPhase, SearchProgress};
pub use stream::RecordReader;
pub use sync::{QueueWatcher, WatchCommand, WatcherHandle};
