//! Client side of the real-time hint channel.
//!
//! [`NotifyClient::connect`] opens a WebSocket to the hub, joins under the
//! session's user id and spawns two background tasks:
//! - a writer that drains an mpsc queue of outgoing hints;
//! - a reader that forwards other clients' `TaskUpdated` hints to
//!   [`NotifyClient::next_hint`].
//!
//! Everything here is best-effort. Announcing never blocks and never fails
//! the caller: a full queue or a dead connection is logged and the hint is
//! dropped. Receivers treat a hint as a cue to re-fetch the board.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use taskboard_proto::UserId;
use taskboard_proto::notify::{self, ClientId, CodecError, HintMessage};

use crate::config::NotifyConfig;

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Errors from connecting to the hint channel.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The WebSocket handshake did not finish in time.
    #[error("hint channel connect timed out")]
    Timeout,

    /// The WebSocket handshake failed.
    #[error("hint channel connect failed: {0}")]
    Connect(String),

    /// A hint could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The connection closed before the join message went out.
    #[error("hint channel closed: {0}")]
    Closed(String),
}

/// Another client changed the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    /// The client that made the change.
    pub origin: ClientId,
}

/// Cloneable handle for announcing local changes.
#[derive(Debug, Clone)]
pub struct Announcer {
    origin: ClientId,
    tx: mpsc::Sender<HintMessage>,
}

impl Announcer {
    /// Queues a `TaskUpdate` hint. Never blocks; drops the hint with a
    /// warning when the queue is full or the connection is gone.
    pub fn announce(&self) {
        let msg = HintMessage::TaskUpdate {
            origin: self.origin,
        };
        if let Err(e) = self.tx.try_send(msg) {
            tracing::warn!(origin = %self.origin, error = %e, "hint dropped");
        }
    }

    /// The identity attached to announcements.
    #[must_use]
    pub const fn origin(&self) -> ClientId {
        self.origin
    }

    /// An announcer with no connection behind it, paired with the receiving
    /// end of its queue. Useful for observing announcements in tests.
    #[must_use]
    pub fn detached(capacity: usize) -> (Self, mpsc::Receiver<HintMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                origin: ClientId::new(),
                tx,
            },
            rx,
        )
    }
}

/// A live connection to the hint hub.
pub struct NotifyClient {
    client_id: ClientId,
    announcer: Announcer,
    hints: mpsc::Receiver<Hint>,
    shutdown: Option<oneshot::Sender<()>>,
    writer: Option<JoinHandle<()>>,
    reader: JoinHandle<()>,
}

impl NotifyClient {
    /// Connects to the hub at `config.url` and joins as `user_id`.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::Timeout`] if the handshake exceeds
    ///   `config.connect_timeout`.
    /// - [`NotifyError::Connect`] if the handshake fails.
    /// - [`NotifyError::Closed`] if the join message cannot be sent.
    pub async fn connect(config: &NotifyConfig, user_id: &UserId) -> Result<Self, NotifyError> {
        let url = config.url.as_str();
        let (ws, _response) = tokio::time::timeout(config.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                tracing::warn!(url, "hint channel connect timed out");
                NotifyError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url, error = %e, "hint channel connect failed");
                NotifyError::Connect(e.to_string())
            })?;

        let (mut sink, stream) = ws.split();
        let join = notify::encode(&HintMessage::Join {
            user_id: user_id.as_str().to_string(),
        })?;
        sink.send(Message::Binary(join.into()))
            .await
            .map_err(|e| NotifyError::Closed(e.to_string()))?;

        let client_id = ClientId::new();
        let capacity = config.channel_capacity.max(1);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (hint_tx, hint_rx) = mpsc::channel(capacity);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let writer = tokio::spawn(writer_loop(sink, out_rx, shutdown_rx));
        let reader = tokio::spawn(reader_loop(stream, hint_tx, client_id));
        tracing::info!(url, %client_id, user_id = %user_id, "joined hint channel");

        Ok(Self {
            client_id,
            announcer: Announcer {
                origin: client_id,
                tx: out_tx,
            },
            hints: hint_rx,
            shutdown: Some(shutdown_tx),
            writer: Some(writer),
            reader,
        })
    }

    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// A handle for announcing changes made by this client.
    #[must_use]
    pub fn announcer(&self) -> Announcer {
        self.announcer.clone()
    }

    /// Waits for the next hint from another client.
    ///
    /// Returns `None` once the connection is gone.
    pub async fn next_hint(&mut self) -> Option<Hint> {
        self.hints.recv().await
    }

    /// Sends whatever hints are still queued, then closes the connection.
    ///
    /// Waits at most `grace`; anything not sent by then is dropped.
    pub async fn close(mut self, grace: Duration) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(writer) = self.writer.take()
            && tokio::time::timeout(grace, writer).await.is_err()
        {
            tracing::warn!("hint writer did not finish in time");
        }
    }
}

impl Drop for NotifyClient {
    fn drop(&mut self) {
        if let Some(writer) = &self.writer {
            writer.abort();
        }
        self.reader.abort();
    }
}

async fn writer_loop(
    mut sink: WsSink,
    mut rx: mpsc::Receiver<HintMessage>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                if send_hint(&mut sink, &msg).await.is_err() {
                    break;
                }
            }
            _ = &mut shutdown => {
                while let Ok(msg) = rx.try_recv() {
                    if send_hint(&mut sink, &msg).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }
    let _ = sink.close().await;
    tracing::debug!("hint writer exiting");
}

async fn send_hint(sink: &mut WsSink, msg: &HintMessage) -> Result<(), ()> {
    let bytes = match notify::encode(msg) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode hint, skipping");
            return Ok(());
        }
    };
    sink.send(Message::Binary(bytes.into())).await.map_err(|e| {
        tracing::warn!(error = %e, "hint channel send failed");
    })
}

async fn reader_loop(mut stream: WsReader, tx: mpsc::Sender<Hint>, own: ClientId) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Binary(data)) => match notify::decode(&data) {
                Ok(HintMessage::TaskUpdated { origin }) if origin == own => {
                    tracing::trace!("ignoring echo of own hint");
                }
                Ok(HintMessage::TaskUpdated { origin }) => {
                    tracing::debug!(%origin, "board changed elsewhere");
                    if tx.send(Hint { origin }).await.is_err() {
                        break;
                    }
                }
                Ok(other) => tracing::debug!(?other, "unexpected hint message"),
                Err(e) => tracing::warn!(error = %e, "malformed hint frame, skipping"),
            },
            Ok(Message::Close(_)) => {
                tracing::info!("hint channel closed by hub");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "hint channel read error");
                break;
            }
        }
    }
    tracing::debug!("hint reader exiting");
}
