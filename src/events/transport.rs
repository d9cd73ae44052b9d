//! Long-lived push connection with automatic reconnect.

use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use super::frame::{FrameDecoder, SseFrame};

/// Upper bound for the delay between reconnect attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// How the push transport waits between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after a clean close or the first failure; the server's `retry:`
    /// hint replaces it once received.
    pub initial_delay: Duration,
    /// Cap for the exponential backoff.
    pub max_delay: Duration,
    /// Adds up to a quarter of the delay at random.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_RECONNECT_DELAY_SECS))
    }
}

impl ReconnectPolicy {
    /// Policy starting at `initial_delay`, capped at [`MAX_RECONNECT_DELAY`], with jitter.
    #[must_use]
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: MAX_RECONNECT_DELAY.max(initial_delay),
            jitter: true,
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    ///
    /// Zero failures means the previous connection was healthy and simply
    /// ended, so only the base delay applies.
    #[must_use]
    pub fn delay_for(&self, failures: u32, server_hint: Option<Duration>) -> Duration {
        let base = server_hint.unwrap_or(self.initial_delay);
        let factor = 2_u32.saturating_pow(failures.saturating_sub(1));
        let delay = base.saturating_mul(factor).min(self.max_delay);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let spread = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
        let extra = rand::thread_rng().gen_range(0..=spread);
        (delay + Duration::from_millis(extra)).min(self.max_delay)
    }
}

enum Attempt {
    /// The server ended an established stream.
    Closed,
    /// The server refused the stream for good.
    Stop(StatusCode),
    /// Transient failure; try again after backoff.
    Retry(String),
}

/// Keeps a push connection open until the server refuses it, calling
/// `on_frame` for every dispatched frame in arrival order.
///
/// Reconnects are not reported to `on_frame`. Returns only on 204, 401 or
/// 403; callers stop it by aborting the task it runs on.
pub(crate) async fn run_event_stream<F>(
    http: Client,
    url: Url,
    policy: ReconnectPolicy,
    mut on_frame: F,
) where
    F: FnMut(SseFrame) + Send,
{
    let mut decoder = FrameDecoder::new();
    let mut failures: u32 = 0;

    loop {
        match connect_once(&http, &url, &mut decoder, &mut on_frame, &mut failures).await {
            Attempt::Closed => debug!("push stream closed by server"),
            Attempt::Stop(status) => {
                warn!(status = status.as_u16(), "push stream refused, not reconnecting");
                return;
            }
            Attempt::Retry(reason) => {
                failures = failures.saturating_add(1);
                warn!(failures, error = %reason, "push stream failed");
            }
        }
        decoder.reset_pending();
        let delay = policy.delay_for(failures, decoder.retry_hint());
        debug!(delay_ms = delay.as_millis(), "reconnecting push stream");
        tokio::time::sleep(delay).await;
    }
}

async fn connect_once<F>(
    http: &Client,
    url: &Url,
    decoder: &mut FrameDecoder,
    on_frame: &mut F,
    failures: &mut u32,
) -> Attempt
where
    F: FnMut(SseFrame) + Send,
{
    let mut request = http
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(last_id) = decoder.last_event_id() {
        request = request.header("Last-Event-ID", last_id);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(error) => return Attempt::Retry(error.to_string()),
    };
    let status = response.status();
    match status {
        StatusCode::NO_CONTENT | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Attempt::Stop(status);
        }
        status if !status.is_success() => return Attempt::Retry(format!("HTTP {status}")),
        _ => {}
    }

    info!(path = url.path(), "push stream connected");
    *failures = 0;

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for frame in decoder.push(&bytes) {
                    on_frame(frame);
                }
            }
            Err(error) => return Attempt::Retry(error.to_string()),
        }
    }
    Attempt::Closed
}
