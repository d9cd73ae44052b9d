//! Single-owner driver loop for the queue view.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{ApiError, QueueBackend};
use crate::events::PushEvent;
use crate::queue::{ActionRejected, ActionTicket, Notice, QueueItem, QueueReconciler};

/// Shortest poll period a watcher accepts; smaller values are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A request sent to a running [`QueueWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Cancel or delete an item.
    Remove(i64),
    /// Re-queue a failed or cancelled item.
    Retry(i64),
    /// Queue new URLs.
    Add(Vec<String>),
    /// Fetch a snapshot now.
    Refresh,
    /// Stop after in-flight calls finish.
    Shutdown,
}

/// Cloneable sender half for [`WatchCommand`]s.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    commands: mpsc::UnboundedSender<WatchCommand>,
}

impl WatcherHandle {
    /// Queues a command; false when the watcher has stopped.
    pub fn send(&self, command: WatchCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Requests cancel/removal of `item_id`.
    pub fn remove(&self, item_id: i64) -> bool {
        self.send(WatchCommand::Remove(item_id))
    }

    /// Requests a retry of `item_id`.
    pub fn retry(&self, item_id: i64) -> bool {
        self.send(WatchCommand::Retry(item_id))
    }

    /// Requests an immediate snapshot.
    pub fn refresh(&self) -> bool {
        self.send(WatchCommand::Refresh)
    }

    /// Asks the watcher to stop.
    pub fn shutdown(&self) -> bool {
        self.send(WatchCommand::Shutdown)
    }
}

enum Completion {
    Snapshot(Result<Vec<QueueItem>, ApiError>),
    Action(ActionTicket, Result<(), ApiError>),
    Added(Result<Vec<QueueItem>, ApiError>),
}

/// Owns the [`QueueReconciler`] and applies every update to it from one task.
///
/// Inputs, all multiplexed in [`run`](Self::run):
/// - a poll tick fetching a snapshot every `poll_interval`
/// - push events forwarded from an event stream handler
/// - user commands from [`WatcherHandle`]s
/// - completions of backend calls it spawned
///
/// Backend calls run concurrently; their results come back to this task
/// before touching the table.
pub struct QueueWatcher {
    backend: Arc<dyn QueueBackend>,
    reconciler: QueueReconciler,
    poll_interval: Duration,
    commands: mpsc::UnboundedReceiver<WatchCommand>,
    push_tx: Option<mpsc::UnboundedSender<PushEvent>>,
    push_rx: mpsc::UnboundedReceiver<PushEvent>,
    snapshot_in_flight: bool,
}

impl std::fmt::Debug for QueueWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueWatcher")
            .field("items", &self.reconciler.len())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl QueueWatcher {
    /// Creates a watcher and the handle used to command it.
    ///
    /// `poll_interval` is raised to [`MIN_POLL_INTERVAL`] when shorter.
    #[must_use]
    pub fn new(backend: Arc<dyn QueueBackend>, poll_interval: Duration) -> (Self, WatcherHandle) {
        if poll_interval < MIN_POLL_INTERVAL {
            warn!(?poll_interval, min = ?MIN_POLL_INTERVAL, "poll interval too short, clamping");
        }
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            backend,
            reconciler: QueueReconciler::new(),
            poll_interval,
            commands,
            push_tx: Some(push_tx),
            push_rx,
            snapshot_in_flight: false,
        };
        (watcher, WatcherHandle {
            commands: command_tx,
        })
    }

    /// Period of the snapshot poll.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// A push handler that forwards events into this watcher.
    ///
    /// Pass it to [`EventStreamClient::on_event`](crate::events::EventStreamClient::on_event).
    pub fn push_forwarder(&self) -> impl FnMut(PushEvent) + Send + 'static {
        let tx = self.push_tx.clone();
        move |event| {
            let delivered = tx.as_ref().is_some_and(|tx| tx.send(event).is_ok());
            if !delivered {
                debug!("watcher stopped, dropping push event");
            }
        }
    }

    /// Runs until [`WatchCommand::Shutdown`] or until every handle is dropped.
    ///
    /// `render` is called after every visible change, with the notice of a
    /// finished user action when there is one. Returns the final table once
    /// in-flight calls have been drained.
    pub async fn run<R>(mut self, mut render: R) -> QueueReconciler
    where
        R: FnMut(&QueueReconciler, Option<&Notice>),
    {
        // Forwarders keep the push channel open; the watcher's own sender must not.
        self.push_tx = None;

        let mut tasks: JoinSet<Completion> = JoinSet::new();

        let cold = self.backend.fetch_queue().await;
        self.on_completion(Completion::Snapshot(cold), &mut tasks, &mut render);

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut push_open = true;

        loop {
            // Pending pushes and results are applied before the next command.
            tokio::select! {
                biased;
                event = self.push_rx.recv(), if push_open => match event {
                    Some(event) => self.on_push(&event, &mut tasks, &mut render),
                    None => {
                        debug!("push channel closed, polling only");
                        push_open = false;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok(completion) => self.on_completion(completion, &mut tasks, &mut render),
                    Err(error) => warn!(error = %error, "queue task failed"),
                },
                command = self.commands.recv() => match command {
                    Some(WatchCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command, &mut tasks, &mut render),
                },
                _ = ticker.tick() => self.request_snapshot(&mut tasks),
            }
        }

        info!(in_flight = tasks.len(), "queue watcher stopping");
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(completion) => self.on_completion(completion, &mut tasks, &mut render),
                Err(error) => warn!(error = %error, "queue task failed"),
            }
        }
        self.reconciler
    }

    fn on_push<R>(&mut self, event: &PushEvent, tasks: &mut JoinSet<Completion>, render: &mut R)
    where
        R: FnMut(&QueueReconciler, Option<&Notice>),
    {
        let outcome = self.reconciler.apply_push(event);
        if outcome.changed() {
            render(&self.reconciler, None);
        }
        if outcome.needs_refresh() {
            debug!(item_id = event.item_id(), event = event.name(), "push requires snapshot");
            self.request_snapshot(tasks);
        }
    }

    fn on_command<R>(&mut self, command: WatchCommand, tasks: &mut JoinSet<Completion>, render: &mut R)
    where
        R: FnMut(&QueueReconciler, Option<&Notice>),
    {
        match command {
            WatchCommand::Remove(item_id) => {
                let started = self.reconciler.begin_remove(item_id);
                self.start_action(started, tasks, render, |backend, id| async move {
                    backend.remove_from_queue(id).await
                });
            }
            WatchCommand::Retry(item_id) => {
                let started = self.reconciler.begin_retry(item_id);
                self.start_action(started, tasks, render, |backend, id| async move {
                    backend.retry_download(id).await
                });
            }
            WatchCommand::Add(urls) => {
                let backend = Arc::clone(&self.backend);
                tasks.spawn(async move { Completion::Added(backend.add_to_queue(&urls).await) });
            }
            WatchCommand::Refresh => self.request_snapshot(tasks),
            WatchCommand::Shutdown => {}
        }
    }

    fn start_action<R, F, Fut>(
        &mut self,
        started: Result<ActionTicket, ActionRejected>,
        tasks: &mut JoinSet<Completion>,
        render: &mut R,
        call: F,
    ) where
        R: FnMut(&QueueReconciler, Option<&Notice>),
        F: FnOnce(Arc<dyn QueueBackend>, i64) -> Fut,
        Fut: std::future::Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        match started {
            Ok(ticket) => {
                render(&self.reconciler, None);
                let pending = call(Arc::clone(&self.backend), ticket.item_id());
                tasks.spawn(async move { Completion::Action(ticket, pending.await) });
            }
            Err(rejected) => {
                debug!(error = %rejected, "queue action rejected");
                render(&self.reconciler, Some(&Notice::Error(rejected.to_string())));
            }
        }
    }

    fn on_completion<R>(
        &mut self,
        completion: Completion,
        tasks: &mut JoinSet<Completion>,
        render: &mut R,
    ) where
        R: FnMut(&QueueReconciler, Option<&Notice>),
    {
        match completion {
            Completion::Snapshot(result) => {
                self.snapshot_in_flight = false;
                match result {
                    Ok(items) => {
                        self.reconciler.replace(items);
                        render(&self.reconciler, None);
                    }
                    Err(error) => {
                        warn!(error = %error, "queue snapshot failed");
                        render(&self.reconciler, Some(&Notice::Error(error.user_message())));
                    }
                }
            }
            Completion::Action(ticket, result) => {
                let outcome = self
                    .reconciler
                    .finish_action(ticket, result.map_err(|e| e.user_message()));
                render(&self.reconciler, Some(&outcome.notice));
                if outcome.refetch {
                    self.request_snapshot(tasks);
                }
            }
            Completion::Added(result) => {
                let notice = match result {
                    Ok(items) => Notice::Success(format!("Added {} item(s) to queue", items.len())),
                    Err(error) => Notice::Error(error.user_message()),
                };
                render(&self.reconciler, Some(&notice));
                self.request_snapshot(tasks);
            }
        }
    }

    fn request_snapshot(&mut self, tasks: &mut JoinSet<Completion>) {
        if self.snapshot_in_flight {
            return;
        }
        self.snapshot_in_flight = true;
        let backend = Arc::clone(&self.backend);
        tasks.spawn(async move { Completion::Snapshot(backend.fetch_queue().await) });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::queue::{CANCELLED_BY_USER_MESSAGE, CANCELLING_MESSAGE, QueuePatch, QueueStatus};

    const LONG_POLL: Duration = Duration::from_secs(3600);

    #[derive(Default)]
    struct FakeBackend {
        snapshot: Mutex<Vec<QueueItem>>,
        fetches: AtomicUsize,
        remove_error: Mutex<Option<&'static str>>,
    }

    impl FakeBackend {
        fn with_items(items: Vec<QueueItem>) -> Arc<Self> {
            Arc::new(Self {
                snapshot: Mutex::new(items),
                ..Self::default()
            })
        }
    }

    #[async_trait]
    impl QueueBackend for FakeBackend {
        async fn fetch_queue(&self) -> Result<Vec<QueueItem>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.snapshot.lock().unwrap().clone())
        }

        async fn add_to_queue(&self, urls: &[String]) -> Result<Vec<QueueItem>, ApiError> {
            let mut snapshot = self.snapshot.lock().unwrap();
            let created: Vec<QueueItem> = urls
                .iter()
                .enumerate()
                .map(|(i, url)| QueueItem::new(100 + i64::try_from(i).unwrap(), url.clone()))
                .collect();
            snapshot.extend(created.iter().cloned());
            Ok(created)
        }

        async fn remove_from_queue(&self, item_id: i64) -> Result<(), ApiError> {
            if let Some(message) = *self.remove_error.lock().unwrap() {
                return Err(ApiError::status(format!("/api/queue/{item_id}"), 400, message));
            }
            let mut snapshot = self.snapshot.lock().unwrap();
            if let Some(item) = snapshot.iter_mut().find(|i| i.id == item_id) {
                if item.status.is_cancellable() {
                    item.status = QueueStatus::Cancelled;
                    item.error_message = Some(CANCELLED_BY_USER_MESSAGE.into());
                    return Ok(());
                }
            }
            snapshot.retain(|i| i.id != item_id);
            Ok(())
        }

        async fn retry_download(&self, _item_id: i64) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn item(id: i64, status: QueueStatus) -> QueueItem {
        let mut item = QueueItem::new(id, format!("https://example.com/{id}"));
        item.status = status;
        item
    }

    #[tokio::test]
    async fn test_cold_fetch_renders_snapshot() {
        let backend = FakeBackend::with_items(vec![item(1, QueueStatus::Pending)]);
        let (watcher, handle) = QueueWatcher::new(backend.clone(), LONG_POLL);
        let mut renders = 0;
        handle.shutdown();

        let final_state = watcher.run(|_, _| renders += 1).await;

        assert_eq!(final_state.len(), 1);
        assert_eq!(renders, 1);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_rejection_refetches_snapshot() {
        let backend = FakeBackend::with_items(vec![item(5, QueueStatus::Downloading)]);
        *backend.remove_error.lock().unwrap() = Some("Item is locked");
        let (watcher, handle) = QueueWatcher::new(backend.clone(), LONG_POLL);
        handle.remove(5);

        let mut statuses = Vec::new();
        let mut notices = Vec::new();
        let stopper = handle.clone();
        let final_state = watcher
            .run(|queue, notice| {
                let current = queue.get(5).unwrap();
                statuses.push((current.status, current.error_message.clone()));
                if let Some(notice) = notice {
                    notices.push(notice.clone());
                    stopper.shutdown();
                }
            })
            .await;

        assert_eq!(
            statuses[1],
            (QueueStatus::Cancelled, Some(CANCELLING_MESSAGE.to_string()))
        );
        assert_eq!(notices, vec![Notice::Error("Item is locked".into())]);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(final_state.get(5).unwrap().status, QueueStatus::Downloading);
        assert!(final_state.get(5).unwrap().error_message.is_none());
    }

    #[tokio::test]
    async fn test_cancel_success_confirms_status() {
        let backend = FakeBackend::with_items(vec![item(5, QueueStatus::Downloading)]);
        let (watcher, handle) = QueueWatcher::new(backend, LONG_POLL);
        handle.remove(5);
        let stopper = handle.clone();

        let final_state = watcher
            .run(|_, notice| {
                if notice.is_some() {
                    stopper.shutdown();
                }
            })
            .await;

        let cancelled = final_state.get(5).unwrap();
        assert_eq!(cancelled.status, QueueStatus::Cancelled);
        assert_eq!(
            cancelled.error_message.as_deref(),
            Some(CANCELLED_BY_USER_MESSAGE)
        );
        assert!(!final_state.is_action_pending(5));
    }

    #[tokio::test]
    async fn test_push_events_are_merged() {
        let mut downloading = item(1, QueueStatus::Downloading);
        downloading.total_chapters = 10;
        downloading.current_chapter = 2;
        let backend = FakeBackend::with_items(vec![downloading]);
        let (watcher, handle) = QueueWatcher::new(backend, LONG_POLL);

        let mut forward = watcher.push_forwarder();
        forward(PushEvent::DownloadProgress {
            item_id: 1,
            patch: QueuePatch::chapters(3, None),
        });
        handle.shutdown();

        let final_state = watcher.run(|_, _| {}).await;
        let merged = final_state.get(1).unwrap();
        assert_eq!((merged.current_chapter, merged.total_chapters), (3, 10));
    }

    #[tokio::test]
    async fn test_retry_of_active_item_is_rejected_locally() {
        let backend = FakeBackend::with_items(vec![item(2, QueueStatus::Downloading)]);
        let (watcher, handle) = QueueWatcher::new(backend, LONG_POLL);
        handle.retry(2);
        let stopper = handle.clone();

        let mut notices = Vec::new();
        watcher
            .run(|_, notice| {
                if let Some(notice) = notice {
                    notices.push(notice.clone());
                    stopper.shutdown();
                }
            })
            .await;

        assert_eq!(notices.len(), 1);
        assert!(notices[0].is_error());
        assert!(notices[0].message().contains("cannot be retried"));
    }

    #[tokio::test]
    async fn test_add_reports_count_and_refreshes() {
        let backend = FakeBackend::with_items(Vec::new());
        let (watcher, handle) = QueueWatcher::new(backend, LONG_POLL);
        handle.send(WatchCommand::Add(vec!["https://b/1".into(), "https://b/2".into()]));
        let stopper = handle.clone();

        let mut notices = Vec::new();
        let final_state = watcher
            .run(|_, notice| {
                if let Some(notice) = notice {
                    notices.push(notice.message().to_string());
                    stopper.shutdown();
                }
            })
            .await;

        assert_eq!(notices, vec!["Added 2 item(s) to queue"]);
        assert_eq!(final_state.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_is_clamped() {
        let backend = FakeBackend::with_items(vec![item(1, QueueStatus::Pending)]);
        let (watcher, handle) = QueueWatcher::new(backend.clone(), Duration::ZERO);
        assert_eq!(watcher.poll_interval(), MIN_POLL_INTERVAL);

        let stopper = handle.clone();
        let mut renders = 0;
        let final_state = tokio::time::timeout(
            Duration::from_secs(5),
            watcher.run(|_, _| {
                renders += 1;
                if renders == 2 {
                    stopper.shutdown();
                }
            }),
        )
        .await
        .unwrap();

        // cold fetch plus at least one poll
        assert_eq!(final_state.len(), 1);
        assert!(backend.fetches.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_watcher_stops_when_handles_dropped() {
        let backend = FakeBackend::with_items(Vec::new());
        let (watcher, handle) = QueueWatcher::new(backend, LONG_POLL);
        drop(handle);
        let final_state = tokio::time::timeout(Duration::from_secs(5), watcher.run(|_, _| {}))
            .await
            .unwrap();
        assert!(final_state.is_empty());
    }
}
