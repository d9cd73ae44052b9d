//! Queue watcher driving the REST client against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use audiobook_core::queue::CANCELLED_BY_USER_MESSAGE;
use audiobook_core::{ApiClient, ClientConfig, Notice, QueueItem, QueueStatus, QueueWatcher};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

const LONG_POLL: Duration = Duration::from_secs(3600);

type Frame = (Vec<QueueItem>, Option<Notice>);

fn client(server: &MockServer) -> ApiClient {
    let config = ClientConfig::with_api_url(&server.uri())
        .unwrap()
        .with_token(Some("tok".to_string()));
    ApiClient::new(config).unwrap()
}

async fn mount_queue(server: &MockServer, items: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(server)
        .await;
}

async fn next_notice(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Frame {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher should render")
            .expect("watcher still running");
        if frame.1.is_some() {
            return frame;
        }
    }
}

#[tokio::test]
async fn test_cancel_active_download_end_to_end() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_queue(
        &server,
        json!([{"id": 1, "url": "https://hdaudiobooks.net/dune/", "title": "Dune", "status": "downloading",
                "current_chapter": 2, "total_chapters": 10}]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/api/queue/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "cancelled"})))
        .expect(1)
        .mount(&server)
        .await;

    let (watcher, handle) = QueueWatcher::new(Arc::new(client(&server)), LONG_POLL);
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let driver = async {
        let (items, _) = rx.recv().await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(handle.remove(1));
        let (items, notice) = next_notice(&mut rx).await;
        assert_eq!(notice, Some(Notice::Success("Download cancelled".to_string())));
        assert_eq!(items[0].status, QueueStatus::Cancelled);
        assert!(handle.shutdown());
    };
    let (final_queue, ()) = tokio::join!(
        watcher.run(move |queue, notice| {
            let _ = tx.send((queue.items().to_vec(), notice.cloned()));
        }),
        driver
    );

    let item = final_queue.get(1).unwrap();
    assert_eq!(item.status, QueueStatus::Cancelled);
    assert_eq!(item.error_message.as_deref(), Some(CANCELLED_BY_USER_MESSAGE));
}

#[tokio::test]
async fn test_retry_rejection_from_server_is_reported() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_queue(
        &server,
        json!([{"id": 4, "url": "https://a.example/4", "status": "failed", "error_message": "timeout"}]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/queue/4/retry"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Can only retry failed or cancelled items"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (watcher, handle) = QueueWatcher::new(Arc::new(client(&server)), LONG_POLL);
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let driver = async {
        rx.recv().await.unwrap();
        assert!(handle.retry(4));
        let (_, notice) = next_notice(&mut rx).await;
        assert_eq!(
            notice,
            Some(Notice::Error("Can only retry failed or cancelled items".to_string()))
        );
        assert!(handle.shutdown());
    };
    let (final_queue, ()) = tokio::join!(
        watcher.run(move |queue, notice| {
            let _ = tx.send((queue.items().to_vec(), notice.cloned()));
        }),
        driver
    );
    assert!(!final_queue.is_action_pending(4));
}

#[tokio::test]
async fn test_unauthorized_snapshot_renders_error_notice() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/queue"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid or expired token"})))
        .mount(&server)
        .await;

    let (watcher, handle) = QueueWatcher::new(Arc::new(client(&server)), LONG_POLL);
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let driver = async {
        let (items, notice) = next_notice(&mut rx).await;
        assert!(items.is_empty());
        assert!(notice.unwrap().is_error());
        assert!(handle.shutdown());
    };
    let (final_queue, ()) = tokio::join!(
        watcher.run(move |queue, notice| {
            let _ = tx.send((queue.items().to_vec(), notice.cloned()));
        }),
        driver
    );
    assert!(final_queue.is_empty());
}
