//! Seams between the network client and the state machines that drive it.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::error::ApiError;
use super::types::SearchRequest;
use crate::queue::QueueItem;

/// Raw response body chunks, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ApiError>> + Send>>;

/// Opens streamed searches.
///
/// Uses `async_trait` so controllers can hold a `&dyn SearchBackend`.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Sends the search and returns the body once a success status arrived.
    async fn open_search(&self, request: &SearchRequest) -> Result<ByteStream, ApiError>;
}

/// Queue snapshot and mutation calls.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Fetches the authoritative queue listing.
    async fn fetch_queue(&self) -> Result<Vec<QueueItem>, ApiError>;

    /// Queues `urls` and returns the created items.
    async fn add_to_queue(&self, urls: &[String]) -> Result<Vec<QueueItem>, ApiError>;

    /// Cancels an active download or deletes an inactive item.
    async fn remove_from_queue(&self, item_id: i64) -> Result<(), ApiError>;

    /// Puts a failed or cancelled item back in the queue.
    async fn retry_download(&self, item_id: i64) -> Result<(), ApiError>;
}
