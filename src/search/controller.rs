//! Search state machine driven by the streamed progress records.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::event::ProgressEvent;
use crate::api::{ApiError, ByteStream, SearchBackend, SearchRequest, SearchResult};
use crate::stream::RecordReader;

/// Status text shown between the request and the first progress record.
pub const STARTING_MESSAGE: &str = "Starting search...";

/// Lifecycle of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Not started.
    Idle,
    /// Request sent, records arriving.
    Running,
    /// A `complete` record arrived.
    Complete,
    /// The request or stream failed, or ended without `complete`.
    Failed,
}

impl SearchPhase {
    /// True for `Complete` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Live progress of a running search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchProgress {
    /// Sites searched so far.
    pub current_site: u32,
    /// Sites in this search; 0 until the `start` record arrives.
    pub total_sites: u32,
    /// Status text.
    pub message: String,
}

impl SearchProgress {
    /// Completed share in `0.0..=1.0`; 0 while the total is unknown.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total_sites == 0 {
            return 0.0;
        }
        (f64::from(self.current_site) / f64::from(self.total_sites)).clamp(0.0, 1.0)
    }
}

/// Why a search produced no results.
#[derive(Debug, Error)]
pub enum SearchError {
    /// `start_search` was called on a controller that already ran.
    #[error("search already started; create a new controller for another search")]
    AlreadyStarted,

    /// The request failed or the stream broke.
    #[error(transparent)]
    Transport(#[from] ApiError),

    /// The stream ended without a `complete` record.
    #[error("Search completed without results")]
    NoResults,
}

impl SearchError {
    /// Short text for the user: the server's message when there is one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(error) => error.user_message(),
            other => other.to_string(),
        }
    }
}

/// Runs exactly one search and tracks its progress.
///
/// `Idle -> Running -> Complete | Failed`. Start a new search with a new
/// controller; late results of an abandoned controller are simply dropped
/// with it.
#[derive(Debug)]
pub struct SearchController {
    phase: SearchPhase,
    progress: SearchProgress,
    results: Vec<SearchResult>,
    error: Option<String>,
}

impl Default for SearchController {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: SearchPhase::Idle,
            progress: SearchProgress::default(),
            results: Vec::new(),
            error: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Latest progress.
    #[must_use]
    pub fn progress(&self) -> &SearchProgress {
        &self.progress
    }

    /// Results of a completed search.
    #[must_use]
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    /// Failure text of a failed search.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Sends the search and follows its progress until `complete`.
    ///
    /// `on_progress` runs after every `start` and `progress` record. Reading
    /// stops at the `complete` record even if the server keeps the body open,
    /// and the body is released on every return path.
    ///
    /// # Errors
    ///
    /// - [`SearchError::AlreadyStarted`] on a second call
    /// - [`SearchError::Transport`] on a failed request or broken stream
    /// - [`SearchError::NoResults`] when the stream ends without `complete`
    #[instrument(skip(self, backend, request, on_progress), fields(query = %request.query))]
    pub async fn start_search<F>(
        &mut self,
        backend: &dyn SearchBackend,
        request: &SearchRequest,
        mut on_progress: F,
    ) -> Result<Vec<SearchResult>, SearchError>
    where
        F: FnMut(&SearchProgress),
    {
        if self.phase != SearchPhase::Idle {
            return Err(SearchError::AlreadyStarted);
        }
        self.phase = SearchPhase::Running;
        self.progress = SearchProgress {
            message: STARTING_MESSAGE.to_string(),
            ..SearchProgress::default()
        };

        let body = match backend.open_search(request).await {
            Ok(body) => body,
            Err(error) => return Err(self.fail(error.into())),
        };
        let mut reader = RecordReader::<ByteStream, ProgressEvent>::new(body);

        loop {
            match reader.next_record().await {
                Ok(Some(ProgressEvent::Complete { results })) => {
                    info!(count = results.len(), "search complete");
                    self.phase = SearchPhase::Complete;
                    self.progress.current_site = self.progress.total_sites;
                    self.results.clone_from(&results);
                    return Ok(results);
                }
                Ok(Some(event)) => {
                    self.apply_progress(event);
                    on_progress(&self.progress);
                }
                Ok(None) => {
                    debug!(skipped = reader.skipped(), "search stream ended early");
                    return Err(self.fail(SearchError::NoResults));
                }
                Err(error) => return Err(self.fail(error.into())),
            }
        }
    }

    fn apply_progress(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Start { total_sites } => {
                debug!(total_sites, "search started");
                self.progress = SearchProgress {
                    current_site: 0,
                    total_sites,
                    message: STARTING_MESSAGE.to_string(),
                };
            }
            ProgressEvent::Progress {
                current_site,
                total_sites,
                message,
            } => {
                if current_site < self.progress.current_site || current_site > total_sites {
                    warn!(
                        previous = self.progress.current_site,
                        current_site, total_sites, "non-monotonic search progress"
                    );
                }
                self.progress = SearchProgress {
                    current_site,
                    total_sites,
                    message: message.filter(|m| !m.is_empty()).unwrap_or_else(|| {
                        format!("Searching {current_site} of {total_sites} sites...")
                    }),
                };
            }
            ProgressEvent::Complete { .. } => {}
        }
    }

    fn fail(&mut self, error: SearchError) -> SearchError {
        warn!(error = %error, "search failed");
        self.phase = SearchPhase::Failed;
        self.error = Some(error.user_message());
        error
    }
}
