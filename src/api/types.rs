//! Request and response bodies of the backend REST API.

use serde::{Deserialize, Serialize};

use crate::queue::QueueItem;

/// Body of `POST /api/search` and `POST /api/search/progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Restrict the search to these catalog sites; all sites when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sites: Option<Vec<String>>,
    /// Results requested per site.
    pub limit: u32,
}

impl SearchRequest {
    /// Builds a request; an empty site list means "all sites".
    #[must_use]
    pub fn new(query: impl Into<String>, sites: Vec<String>, limit: u32) -> Self {
        Self {
            query: query.into(),
            sites: if sites.is_empty() { None } else { Some(sites) },
            limit,
        }
    }
}

/// One catalog hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Book title.
    pub title: String,
    /// Author, when the site lists one.
    #[serde(default)]
    pub author: Option<String>,
    /// Catalog site name.
    pub site: String,
    /// Book page URL; this is what gets queued.
    pub url: String,
    /// Cover image URL.
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Which field matched the query.
    #[serde(default, rename = "match")]
    pub matched: Option<String>,
    /// Relevance score.
    #[serde(default)]
    pub score: f64,
}

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Body of `GET /api/search/sites`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SitesResponse {
    #[serde(default)]
    pub sites: Vec<String>,
}

/// Body of `GET /api/queue` and `POST /api/queue`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QueueSnapshot {
    #[serde(default)]
    pub items: Vec<QueueItem>,
}

/// Body of `POST /api/queue`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AddToQueueRequest<'a> {
    pub urls: &'a [String],
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub password: &'a str,
}

/// Response of `POST /api/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for subsequent calls.
    pub access_token: String,
    /// Token scheme, normally `bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// One finished download in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// History entry id.
    pub id: i64,
    /// Source book page.
    pub url: String,
    /// Book title.
    pub title: String,
    /// Author.
    #[serde(default)]
    pub author: Option<String>,
    /// Narrator.
    #[serde(default)]
    pub narrator: Option<String>,
    /// Publication year as listed by the site.
    #[serde(default)]
    pub year: Option<String>,
    /// Catalog site.
    #[serde(default)]
    pub site: Option<String>,
    /// Number of chapters downloaded.
    #[serde(default)]
    pub chapters_total: u32,
    /// Location on the server.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Completion timestamp as sent by the server.
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// One page of download history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownloadsPage {
    /// Entries on this page.
    #[serde(default)]
    pub items: Vec<DownloadRecord>,
    /// Total entries matching the filter.
    #[serde(default)]
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl DownloadsPage {
    /// Number of pages for the current filter.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Query for `GET /api/downloads`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadsQuery {
    /// 1-based page number.
    pub page: u32,
    /// Page size (1..=100).
    pub limit: u32,
    /// Optional title/author filter.
    pub search: Option<String>,
}

impl Default for DownloadsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            search: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_omits_empty_sites() {
        let body = serde_json::to_value(SearchRequest::new("dune", Vec::new(), 20)).unwrap();
        assert_eq!(body, serde_json::json!({"query": "dune", "limit": 20}));

        let body =
            serde_json::to_value(SearchRequest::new("dune", vec!["hdaudiobooks".into()], 5))
                .unwrap();
        assert_eq!(body["sites"], serde_json::json!(["hdaudiobooks"]));
    }

    #[test]
    fn test_search_result_reads_match_field() {
        let result: SearchResult = serde_json::from_str(
            r#"{"title":"Dune","author":null,"site":"bigaudiobooks","url":"https://b/1","match":"title"}"#,
        )
        .unwrap();
        assert_eq!(result.matched.as_deref(), Some("title"));
        assert!(result.author.is_none());
        assert!((result.score - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_queue_snapshot_ignores_extra_server_fields() {
        let snapshot: QueueSnapshot = serde_json::from_str(
            r#"{"items":[{"id":1,"url":"https://b/1","title":null,"author":null,"narrator":null,
                "site":"s","cover_url":null,"status":"downloading","current_chapter":2,
                "total_chapters":10,"error_message":null,"created_at":"2024-01-01T00:00:00",
                "started_at":null,"completed_at":null}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].total_chapters, 10);
    }

    #[test]
    fn test_downloads_page_count() {
        let page = DownloadsPage {
            items: Vec::new(),
            total: 41,
            page: 1,
            limit: 20,
        };
        assert_eq!(page.page_count(), 3);
    }

    #[test]
    fn test_token_response_default_type() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(token.token_type, "bearer");
    }
}
