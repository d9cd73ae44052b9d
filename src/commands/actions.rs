//! One-shot queue actions: add, remove and retry.

use std::io::{self, IsTerminal, Read};

use anyhow::{Result, bail};
use audiobook_core::queue::ActionKind;
use audiobook_core::{Notice, QueueBackend, QueueReconciler, extract_urls};
use tracing::{info, warn};

use crate::cli::AddArgs;
use crate::context::RunContext;
use crate::output;

pub async fn run_add_command(ctx: &RunContext, args: &AddArgs) -> Result<()> {
    let input_text = if !args.urls.is_empty() {
        args.urls.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        println!("{}", output::NO_INPUT_GUIDANCE);
        println!("{}", output::INPUT_ARG_EXAMPLE);
        bail!("No URLs to add");
    };

    let extracted = extract_urls(&input_text);
    for rejected in &extracted.rejected {
        warn!(error = %rejected, "Skipped invalid URL");
    }
    if extracted.urls.is_empty() {
        match extracted.rejected.into_iter().next() {
            Some(first) => bail!(first),
            None => bail!(audiobook_core::InputError::NoUrls),
        }
    }

    let client = ctx.authed_client()?;
    let added = client.add_to_queue(&extracted.urls).await?;
    info!(count = added.len(), "queued URLs");
    println!("Added {} item(s) to queue", added.len());
    for item in &added {
        println!("  #{} {}", item.id, item.url);
    }
    Ok(())
}

pub async fn run_remove_command(ctx: &RunContext, item_id: i64) -> Result<()> {
    let client = ctx.authed_client()?;
    run_action(&client, item_id, ActionKind::Remove).await
}

pub async fn run_retry_command(ctx: &RunContext, item_id: i64) -> Result<()> {
    let client = ctx.authed_client()?;
    run_action(&client, item_id, ActionKind::Retry).await
}

/// Loads the queue, validates the action against it, then performs it.
///
/// `ActionKind::Remove` stands for both cancel and delete; the table decides
/// which one from the item's status.
async fn run_action(backend: &dyn QueueBackend, item_id: i64, kind: ActionKind) -> Result<()> {
    let mut queue = QueueReconciler::new();
    queue.replace(backend.fetch_queue().await?);

    let ticket = match kind {
        ActionKind::Retry => queue.begin_retry(item_id)?,
        ActionKind::Cancel | ActionKind::Remove => queue.begin_remove(item_id)?,
    };
    let result = match ticket.kind() {
        ActionKind::Retry => backend.retry_download(item_id).await,
        ActionKind::Cancel | ActionKind::Remove => backend.remove_from_queue(item_id).await,
    };
    let outcome = queue.finish_action(ticket, result.map_err(|error| error.user_message()));

    match outcome.notice {
        Notice::Success(message) => {
            println!("{message}");
            Ok(())
        }
        Notice::Error(message) => bail!(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use audiobook_core::{ApiError, QueueItem, QueueStatus};

    #[derive(Default)]
    struct FakeQueue {
        items: Vec<QueueItem>,
        calls: Mutex<Vec<String>>,
        fail_with: Option<&'static str>,
    }

    #[async_trait]
    impl QueueBackend for FakeQueue {
        async fn fetch_queue(&self) -> Result<Vec<QueueItem>, ApiError> {
            Ok(self.items.clone())
        }

        async fn add_to_queue(&self, _urls: &[String]) -> Result<Vec<QueueItem>, ApiError> {
            Ok(Vec::new())
        }

        async fn remove_from_queue(&self, item_id: i64) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("remove {item_id}"));
            self.fail_with
                .map_or(Ok(()), |message| Err(ApiError::status("/api/queue", 500, message)))
        }

        async fn retry_download(&self, item_id: i64) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("retry {item_id}"));
            self.fail_with
                .map_or(Ok(()), |message| Err(ApiError::status("/api/retry", 500, message)))
        }
    }

    fn item(id: i64, status: QueueStatus) -> QueueItem {
        let mut item = QueueItem::new(id, format!("https://a.example/{id}"));
        item.set_status(status);
        item
    }

    #[test]
    fn test_retry_of_active_item_is_rejected_before_network() {
        let backend = FakeQueue {
            items: vec![item(1, QueueStatus::Downloading)],
            ..FakeQueue::default()
        };
        let err = tokio_test::block_on(run_action(&backend, 1, ActionKind::Retry)).unwrap_err();
        assert!(err.to_string().contains("cannot be retried"), "{err}");
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_item_is_rejected() {
        let backend = FakeQueue::default();
        let err = tokio_test::block_on(run_action(&backend, 9, ActionKind::Remove)).unwrap_err();
        assert!(err.to_string().contains('9'), "{err}");
    }

    #[test]
    fn test_remove_calls_backend() {
        let backend = FakeQueue {
            items: vec![item(3, QueueStatus::Completed)],
            ..FakeQueue::default()
        };
        tokio_test::block_on(run_action(&backend, 3, ActionKind::Remove)).unwrap();
        assert_eq!(*backend.calls.lock().unwrap(), vec!["remove 3"]);
    }

    #[test]
    fn test_server_error_becomes_command_error() {
        let backend = FakeQueue {
            items: vec![item(5, QueueStatus::Failed)],
            fail_with: Some("Item not found"),
            ..FakeQueue::default()
        };
        let err = tokio_test::block_on(run_action(&backend, 5, ActionKind::Retry)).unwrap_err();
        assert_eq!(err.to_string(), "Item not found");
    }
}
