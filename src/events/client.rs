//! Push subscription handle.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

use super::event::{PushEvent, decode_push_event};
use super::transport::{ReconnectPolicy, run_event_stream};
use crate::api::ApiClient;

/// Path of the backend's server-sent event endpoint.
pub const STATUS_STREAM_PATH: &str = "/api/status/stream";

type Handler = Box<dyn FnMut(PushEvent) + Send>;
type HandlerSlot = Arc<Mutex<Option<Handler>>>;

/// Subscribes to queue push events.
///
/// The client only decodes and forwards; merging is left to the handler.
#[derive(Debug, Clone)]
pub struct EventStreamClient {
    http: Client,
    url: Option<Url>,
    policy: ReconnectPolicy,
}

impl EventStreamClient {
    /// Creates a client sharing `api`'s connection pool and settings.
    ///
    /// Without a token no connection is ever opened.
    #[must_use]
    pub fn new(api: &ApiClient) -> Self {
        let config = api.config();
        let url = config.token.as_deref().map(|token| {
            let mut url = config.endpoint(STATUS_STREAM_PATH);
            url.query_pairs_mut().append_pair("token", token);
            url
        });
        Self {
            http: api.http().clone(),
            url,
            policy: ReconnectPolicy::new(config.reconnect_delay),
        }
    }

    /// Replaces the reconnect policy.
    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// True when a token is configured and subscriptions will connect.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Opens the push connection and calls `handler` for every decoded event,
    /// in the order the server sent them.
    ///
    /// Must be called from within a Tokio runtime. Without a token this
    /// returns an inactive handle and opens nothing.
    pub fn on_event<H>(&self, handler: H) -> Subscription
    where
        H: FnMut(PushEvent) + Send + 'static,
    {
        let Some(url) = self.url.clone() else {
            debug!("no access token, push subscription disabled");
            return Subscription::noop();
        };

        let slot: HandlerSlot = Arc::new(Mutex::new(Some(Box::new(handler))));
        let deliver_to = Arc::clone(&slot);
        let task = tokio::spawn(run_event_stream(
            self.http.clone(),
            url,
            self.policy,
            move |frame| {
                let Some(event) = decode_push_event(&frame) else {
                    return;
                };
                let mut guard = deliver_to.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(handler) = guard.as_mut() {
                    handler(event);
                }
            },
        ));
        info!("push subscription started");

        Subscription {
            handler: Some(slot),
            task: Some(task),
        }
    }
}

/// Handle to a push subscription; dropping it also unsubscribes.
#[must_use = "dropping a subscription closes it"]
pub struct Subscription {
    handler: Option<HandlerSlot>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// A handle that was never connected.
    pub fn noop() -> Self {
        Self {
            handler: None,
            task: None,
        }
    }

    /// True while the connection task runs and the handler is installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let installed = self.handler.as_ref().is_some_and(|slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        });
        installed && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Closes the connection.
    ///
    /// Once this returns the handler is never called again. Must not be
    /// called from inside the handler itself.
    pub fn unsubscribe(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(slot) = self.handler.take() {
            // Waits out a delivery in progress, then uninstalls the handler.
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("push subscription closed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
