//! REST client for the audiobook backend.
//!
//! - [`ApiClient`] - one method per endpoint, bearer-authenticated
//! - [`SearchBackend`] / [`QueueBackend`] - the seams the search controller
//!   and queue watcher depend on, so tests can substitute fakes
//! - [`ApiError`] - transport, status and decode failures with the server's message

mod backend;
mod client;
mod error;
mod types;

pub use backend::{ByteStream, QueueBackend, SearchBackend};
pub use client::ApiClient;
pub use error::{ApiError, error_message_from_body};
pub use types::{
    DownloadRecord, DownloadsPage, DownloadsQuery, SearchRequest, SearchResult, TokenResponse,
};
