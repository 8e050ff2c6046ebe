//! Integration tests for the real-time hint channel client.
//!
//! Starts a minimal loopback hub on `tokio_tungstenite::accept_async` that
//! records joins and fans every `TaskUpdate` out to all connections as
//! `TaskUpdated`, echo included.
//!
//! Verification command: `cargo test --test hint_channel`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use chrono::NaiveDate;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use taskboard::config::NotifyConfig;
use taskboard::controller::TaskController;
use taskboard::notify::{NotifyClient, NotifyError};
use taskboard::store::memory::MemoryTaskStore;
use taskboard_proto::notify::{self, ClientId, HintMessage};
use taskboard_proto::{TaskDraft, TaskStatus, UserId};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

// =============================================================================
// Test hub
// =============================================================================

/// Starts the hub and returns its URL plus a stream of joined user ids.
async fn start_hub() -> (Url, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (joins_tx, joins_rx) = mpsc::unbounded_channel();
    let (fanout, _) = broadcast::channel::<Vec<u8>>(64);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let joins = joins_tx.clone();
            let fanout = fanout.clone();
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut frames) = ws.split();
                let mut outgoing = fanout.subscribe();
                loop {
                    tokio::select! {
                        frame = frames.next() => match frame {
                            Some(Ok(Message::Binary(data))) => match notify::decode(&data) {
                                Ok(HintMessage::Join { user_id }) => {
                                    let _ = joins.send(user_id);
                                }
                                Ok(HintMessage::TaskUpdate { origin }) => {
                                    let bytes =
                                        notify::encode(&HintMessage::TaskUpdated { origin }).unwrap();
                                    let _ = fanout.send(bytes);
                                }
                                _ => {}
                            },
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                        out = outgoing.recv() => match out {
                            Ok(bytes) => {
                                if sink.send(Message::Binary(bytes.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(_) => break,
                        },
                    }
                }
            });
        }
    });

    (Url::parse(&format!("ws://{addr}/ws")).unwrap(), joins_rx)
}

fn config(url: Url) -> NotifyConfig {
    NotifyConfig {
        url,
        channel_capacity: 16,
        connect_timeout: Duration::from_secs(2),
    }
}

async fn joined(
    url: &Url,
    joins: &mut mpsc::UnboundedReceiver<String>,
    user: &str,
) -> NotifyClient {
    let client = NotifyClient::connect(&config(url.clone()), &UserId::new(user))
        .await
        .expect("connect to hub");
    let who = tokio::time::timeout(WAIT, joins.recv())
        .await
        .expect("join reached hub")
        .unwrap();
    assert_eq!(who, user);
    client
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn announcement_reaches_peers_but_not_self() {
    let (url, mut joins) = start_hub().await;
    let mut alice = joined(&url, &mut joins, "alice").await;
    let mut bob = joined(&url, &mut joins, "bob").await;

    alice.announcer().announce();

    let hint = tokio::time::timeout(WAIT, bob.next_hint())
        .await
        .expect("bob got a hint")
        .unwrap();
    assert_eq!(hint.origin, alice.client_id());
    assert!(
        tokio::time::timeout(QUIET, alice.next_hint()).await.is_err(),
        "alice must ignore the echo of her own hint"
    );
}

#[tokio::test]
async fn confirmed_controller_mutations_are_announced() {
    let (url, mut joins) = start_hub().await;
    let alice = joined(&url, &mut joins, "alice").await;
    let mut bob = joined(&url, &mut joins, "bob").await;

    let controller = TaskController::new(MemoryTaskStore::new()).with_announcer(alice.announcer());
    let task = controller
        .create(&TaskDraft::new("Spec", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()))
        .await
        .unwrap();
    controller.move_task(&task.id, TaskStatus::Done).await.unwrap();

    for _ in 0..2 {
        let hint = tokio::time::timeout(WAIT, bob.next_hint())
            .await
            .expect("hint per mutation")
            .unwrap();
        assert_eq!(hint.origin, alice.client_id());
    }
}

#[tokio::test]
async fn close_flushes_queued_hints() {
    let (url, mut joins) = start_hub().await;
    let alice = joined(&url, &mut joins, "alice").await;
    let mut bob = joined(&url, &mut joins, "bob").await;
    let origin = alice.client_id();

    alice.announcer().announce();
    alice.close(WAIT).await;

    let hint = tokio::time::timeout(WAIT, bob.next_hint())
        .await
        .expect("flushed hint arrives")
        .unwrap();
    assert_eq!(hint.origin, origin);
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stranger = ClientId::new();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _join = ws.next().await;
        ws.send(Message::Binary(vec![0xff, 0xfe, 0xfd].into()))
            .await
            .unwrap();
        let good = notify::encode(&HintMessage::TaskUpdated { origin: stranger }).unwrap();
        ws.send(Message::Binary(good.into())).await.unwrap();
        tokio::time::sleep(WAIT).await;
    });

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let mut client = NotifyClient::connect(&config(url), &UserId::new("carol"))
        .await
        .unwrap();
    let hint = tokio::time::timeout(WAIT, client.next_hint())
        .await
        .expect("valid hint after garbage")
        .unwrap();
    assert_eq!(hint.origin, stranger);
}

#[tokio::test]
async fn unreachable_hub_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let result = NotifyClient::connect(&config(url), &UserId::new("dave")).await;
    assert!(matches!(result, Err(NotifyError::Connect(_))));
}

#[tokio::test]
async fn hub_disconnect_ends_hint_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _join = ws.next().await;
        let _ = ws.close(None).await;
    });

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let mut client = NotifyClient::connect(&config(url), &UserId::new("erin"))
        .await
        .unwrap();
    let next = tokio::time::timeout(WAIT, client.next_hint())
        .await
        .expect("stream ends promptly");
    assert!(next.is_none());

    // Announcing into a dead channel is silent.
    client.announcer().announce();
}
