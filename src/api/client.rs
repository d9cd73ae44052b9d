//! HTTP client for the audiobook backend REST API.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::backend::{ByteStream, QueueBackend, SearchBackend};
use super::error::{ApiError, error_message_from_body};
use super::types::{
    AddToQueueRequest, DownloadsPage, DownloadsQuery, LoginRequest, QueueSnapshot, SearchRequest,
    SearchResponse, SearchResult, SitesResponse, TokenResponse,
};
use crate::config::ClientConfig;
use crate::queue::QueueItem;
use crate::user_agent;

/// Client for every REST endpoint the backend exposes.
///
/// Create it once and clone it freely; clones share the connection pool.
///
/// # Example
///
/// ```no_run
/// use audiobook_core::api::ApiClient;
/// use audiobook_core::config::ClientConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::default().with_token(Some("token".into()));
/// let client = ApiClient::new(config)?;
/// for item in client.fetch_queue().await? {
///     println!("{item}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: Arc<ClientConfig>,
}

impl ApiClient {
    /// Builds the HTTP client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] when reqwest rejects the settings.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fails fast when no token is configured, before any request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`].
    pub fn require_token(&self) -> Result<&str, ApiError> {
        self.config.token.as_deref().ok_or(ApiError::MissingToken)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Exchanges the shared password for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] with "Invalid password" (or the server's
    /// message) when the password is rejected.
    #[instrument(skip(self, password))]
    pub async fn login(&self, password: &str) -> Result<TokenResponse, ApiError> {
        const PATH: &str = "/api/auth/login";
        let request = self
            .http
            .post(self.config.endpoint(PATH))
            .timeout(self.config.request_timeout)
            .json(&LoginRequest { password });
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(PATH, e))?;
        let response = ensure_success(PATH, response, "Invalid password").await?;
        read_json(PATH, response).await
    }

    /// Runs a search and waits for the full result list.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    #[instrument(skip(self, request), fields(query = %request.query))]
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ApiError> {
        const PATH: &str = "/api/search";
        let builder = self.rest(self.http.post(self.config.endpoint(PATH)).json(request));
        let response = self.send(PATH, builder, "Search failed").await?;
        let body: SearchResponse = read_json(PATH, response).await?;
        Ok(body.results)
    }

    /// Sends a streamed search and returns the raw body once the status is known.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails or the status is not a success.
    #[instrument(skip(self, request), fields(query = %request.query))]
    pub async fn open_search_stream(&self, request: &SearchRequest) -> Result<ByteStream, ApiError> {
        const PATH: &str = "/api/search/progress";
        // No whole-request timeout: the body stays open while sites are searched.
        let builder = self
            .authorize(self.http.post(self.config.endpoint(PATH)))
            .json(request);
        let response = self.send(PATH, builder, "Search failed").await?;
        Ok(body_stream(PATH, response))
    }

    /// Lists the catalog sites the backend can search.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    #[instrument(skip(self))]
    pub async fn list_sites(&self) -> Result<Vec<String>, ApiError> {
        const PATH: &str = "/api/search/sites";
        let builder = self.rest(self.http.get(self.config.endpoint(PATH)));
        let response = self.send(PATH, builder, "Failed to fetch sites").await?;
        let body: SitesResponse = read_json(PATH, response).await?;
        Ok(body.sites)
    }

    /// Fetches the authoritative queue listing.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    #[instrument(skip(self))]
    pub async fn fetch_queue(&self) -> Result<Vec<QueueItem>, ApiError> {
        const PATH: &str = "/api/queue";
        let builder = self.rest(self.http.get(self.config.endpoint(PATH)));
        let response = self.send(PATH, builder, "Failed to fetch queue").await?;
        let body: QueueSnapshot = read_json(PATH, response).await?;
        Ok(body.items)
    }

    /// Queues book page URLs and returns the created items.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn add_to_queue(&self, urls: &[String]) -> Result<Vec<QueueItem>, ApiError> {
        const PATH: &str = "/api/queue";
        let builder = self.rest(
            self.http
                .post(self.config.endpoint(PATH))
                .json(&AddToQueueRequest { urls }),
        );
        let response = self.send(PATH, builder, "Failed to add to queue").await?;
        let body: QueueSnapshot = read_json(PATH, response).await?;
        debug!(created = body.items.len(), "queued urls");
        Ok(body.items)
    }

    /// Cancels an active download or deletes an inactive queue item.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    #[instrument(skip(self))]
    pub async fn remove_from_queue(&self, item_id: i64) -> Result<(), ApiError> {
        let path = format!("/api/queue/{item_id}");
        let builder = self.rest(self.http.delete(self.config.endpoint(&path)));
        self.send(&path, builder, "Failed to remove from queue")
            .await
            .map(drop)
    }

    /// Re-queues a failed or cancelled item.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    #[instrument(skip(self))]
    pub async fn retry_download(&self, item_id: i64) -> Result<(), ApiError> {
        let path = format!("/api/queue/{item_id}/retry");
        let builder = self.rest(self.http.post(self.config.endpoint(&path)));
        self.send(&path, builder, "Failed to retry download")
            .await
            .map(drop)
    }

    /// Fetches one page of download history.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    #[instrument(skip(self))]
    pub async fn list_downloads(&self, query: &DownloadsQuery) -> Result<DownloadsPage, ApiError> {
        const PATH: &str = "/api/downloads";
        let url = downloads_url(self.config.endpoint(PATH), query);
        let builder = self.rest(self.http.get(url));
        let response = self
            .send(PATH, builder, "Failed to fetch downloads")
            .await?;
        read_json(PATH, response).await
    }

    /// Deletes one history entry.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-success status.
    #[instrument(skip(self))]
    pub async fn delete_download(&self, download_id: i64) -> Result<(), ApiError> {
        let path = format!("/api/downloads/{download_id}");
        let builder = self.rest(self.http.delete(self.config.endpoint(&path)));
        self.send(&path, builder, "Failed to delete download")
            .await
            .map(drop)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Authorized request with the per-call timeout.
    fn rest(&self, builder: RequestBuilder) -> RequestBuilder {
        self.authorize(builder).timeout(self.config.request_timeout)
    }

    async fn send(
        &self,
        path: &str,
        builder: RequestBuilder,
        fallback: &str,
    ) -> Result<Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::network(path, e))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(endpoint = path, "request rejected as unauthorized");
            return Err(ApiError::unauthorized(path));
        }
        ensure_success(path, response, fallback).await
    }
}

#[async_trait]
impl SearchBackend for ApiClient {
    async fn open_search(&self, request: &SearchRequest) -> Result<ByteStream, ApiError> {
        self.open_search_stream(request).await
    }
}

#[async_trait]
impl QueueBackend for ApiClient {
    async fn fetch_queue(&self) -> Result<Vec<QueueItem>, ApiError> {
        ApiClient::fetch_queue(self).await
    }

    async fn add_to_queue(&self, urls: &[String]) -> Result<Vec<QueueItem>, ApiError> {
        ApiClient::add_to_queue(self, urls).await
    }

    async fn remove_from_queue(&self, item_id: i64) -> Result<(), ApiError> {
        ApiClient::remove_from_queue(self, item_id).await
    }

    async fn retry_download(&self, item_id: i64) -> Result<(), ApiError> {
        ApiClient::retry_download(self, item_id).await
    }
}

fn build_http_client(config: &ClientConfig) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
        .map_err(ApiError::ClientBuild)
}

async fn ensure_success(
    path: &str,
    response: Response,
    fallback: &str,
) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message_from_body(&body, fallback);
    warn!(endpoint = path, status = status.as_u16(), error = %message, "request failed");
    Err(ApiError::status(path, status.as_u16(), message))
}

async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::network(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(path, e))
}

fn body_stream(path: &str, response: Response) -> ByteStream {
    let path = path.to_string();
    Box::pin(response.bytes_stream().map(move |chunk| {
        chunk
            .map(|bytes| bytes.to_vec())
            .map_err(|e| ApiError::network(path.as_str(), e))
    }))
}

fn downloads_url(mut url: Url, query: &DownloadsQuery) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("page", &query.page.to_string());
        pairs.append_pair("limit", &query.limit.to_string());
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.append_pair("search", search);
        }
    }
    url
}
