//! WebSocket client for the `lotion-store` server.
//!
//! Implements the [`TaskStore`] trait over one WebSocket connection. Commits
//! carry a request id and wait for the matching `Committed` or `Rejected`
//! reply; feed snapshots pushed by the server are fanned out to every
//! [`LiveFeed`] created by [`RemoteStore::subscribe`]. The reader task holds
//! the only strong handle on that fan-out, so every feed ends when the
//! connection does.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lotion_proto::batch::WriteBatch;
use lotion_proto::store::{self, FeedKey, FeedSnapshot, RequestId, StoreMessage};
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{LiveFeed, StoreError, TaskStore};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Commits waiting for an acknowledgment, keyed by request id.
type PendingCommits =
    Arc<parking_lot::Mutex<HashMap<RequestId, oneshot::Sender<Result<(), StoreError>>>>>;

/// Connection settings for [`RemoteStore::connect`].
#[derive(Debug, Clone, Copy)]
pub struct RemoteOptions {
    /// How long to wait for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// How long to wait for a commit acknowledgment.
    pub commit_timeout: Duration,
    /// Capacity of the local snapshot fan-out channel.
    pub feed_buffer: usize,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            commit_timeout: Duration::from_secs(10),
            feed_buffer: 256,
        }
    }
}

/// A [`TaskStore`] backed by a remote `lotion-store` server.
///
/// Created via [`RemoteStore::connect`], which establishes the WebSocket
/// connection and spawns a background reader task.
pub struct RemoteStore {
    /// The store server URL (ws:// or wss://).
    url: String,
    /// Write half of the WebSocket connection (shared for concurrent sends).
    ws_sender: Arc<Mutex<WsSender>>,
    /// Commits awaiting a reply.
    pending: PendingCommits,
    /// Fan-out of every snapshot the server pushes. Owned by the reader task.
    feed_tx: broadcast::WeakSender<FeedSnapshot>,
    /// Next commit request id.
    next_request: AtomicU64,
    /// Whether the WebSocket connection is active.
    connected: Arc<AtomicBool>,
    /// How long a commit may wait for its reply.
    commit_timeout: Duration,
    /// Handle to the background reader task.
    reader_handle: tokio::task::JoinHandle<()>,
}

impl RemoteStore {
    /// Connect to a store server.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if the handshake does not finish in time.
    /// - [`StoreError::Unavailable`] if the server cannot be reached.
    pub async fn connect(url: &str, options: RemoteOptions) -> Result<Self, StoreError> {
        let (ws_stream, _response) =
            tokio::time::timeout(options.connect_timeout, connect_async(url))
                .await
                .map_err(|_| {
                    tracing::warn!(url, "store WebSocket connect timed out");
                    StoreError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url, err = %e, "store WebSocket connect failed");
                    map_ws_connect_error(e)
                })?;

        let (ws_sender, ws_reader) = ws_stream.split();
        let (feed_tx, _) = broadcast::channel(options.feed_buffer.max(1));
        let pending: PendingCommits = Arc::default();
        let connected = Arc::new(AtomicBool::new(true));

        let weak_feed_tx = feed_tx.downgrade();
        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            Arc::clone(&pending),
            feed_tx,
            Arc::clone(&connected),
        ));

        tracing::info!(url, "connected to store");
        Ok(Self {
            url: url.to_string(),
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            pending,
            feed_tx: weak_feed_tx,
            next_request: AtomicU64::new(1),
            connected,
            commit_timeout: options.commit_timeout,
            reader_handle,
        })
    }

    /// Return the server URL this store is connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Encodes and sends one message.
    async fn send(&self, msg: &StoreMessage) -> Result<(), StoreError> {
        if !self.is_connected() {
            return Err(StoreError::ConnectionClosed);
        }
        let bytes = store::encode(msg).map_err(|e| StoreError::Codec(e.to_string()))?;
        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "store send failed");
                self.connected.store(false, Ordering::Relaxed);
                StoreError::ConnectionClosed
            })
    }
}

impl Drop for RemoteStore {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

impl TaskStore for RemoteStore {
    /// Sends the batch and waits for the server's verdict.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Rejected`] if the server refused the batch.
    /// - [`StoreError::Timeout`] if no reply arrived in time. The batch may
    ///   still have been committed; the live feed will tell.
    /// - [`StoreError::ConnectionClosed`] if the connection dropped.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(request_id, reply_tx);

        let ops = batch.len();
        if let Err(e) = self.send(&StoreMessage::Commit { request_id, batch }).await {
            self.pending.lock().remove(&request_id);
            return Err(e);
        }
        tracing::debug!(request_id, ops, "commit sent");

        match tokio::time::timeout(self.commit_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(StoreError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                tracing::warn!(request_id, "commit acknowledgment timed out");
                Err(StoreError::Timeout)
            }
        }
    }

    async fn subscribe(&self, key: FeedKey) -> Result<LiveFeed, StoreError> {
        // Subscribe locally first so the server's initial snapshot is not missed.
        let rx = self
            .feed_tx
            .upgrade()
            .ok_or(StoreError::ConnectionClosed)?
            .subscribe();
        let request = match &key {
            FeedKey::Tasks(project_id) => StoreMessage::Subscribe {
                project_id: project_id.clone(),
            },
            FeedKey::Projects => StoreMessage::SubscribeProjects,
        };
        self.send(&request).await?;
        Ok(LiveFeed::new(key, None, rx))
    }

    /// Tells the server to stop pushing a project's task list.
    ///
    /// The project list feed has no server-side unsubscribe and is left
    /// running.
    async fn unsubscribe(&self, key: FeedKey) -> Result<(), StoreError> {
        match key {
            FeedKey::Tasks(project_id) => {
                self.send(&StoreMessage::Unsubscribe { project_id }).await
            }
            FeedKey::Projects => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Background task that reads WebSocket messages and dispatches them.
///
/// Commit replies resolve the matching pending request; snapshots go to the
/// local fan-out channel. Malformed frames are logged and skipped. When the
/// connection ends every pending commit fails with
/// [`StoreError::ConnectionClosed`] and `feed_tx` is dropped, which closes
/// every live feed.
async fn reader_loop(
    mut ws_reader: WsReader,
    pending: PendingCommits,
    feed_tx: broadcast::Sender<FeedSnapshot>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match store::decode(&data) {
                Ok(StoreMessage::Committed { request_id }) => {
                    resolve(&pending, request_id, Ok(()));
                }
                Ok(StoreMessage::Rejected { request_id, reason }) => {
                    resolve(&pending, request_id, Err(StoreError::Rejected(reason)));
                }
                Ok(
                    msg @ (StoreMessage::TaskSnapshot { .. }
                    | StoreMessage::ProjectSnapshot { .. }),
                ) => {
                    if let Some(snapshot) = msg.into_snapshot() {
                        // No live feeds is fine.
                        let _ = feed_tx.send(snapshot);
                    }
                }
                Ok(StoreMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "store server error");
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected store message type");
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed store frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("store WebSocket closed by server");
                break;
            }
            Ok(_) => {
                // Ignore ping/pong/text and raw frames.
            }
            Err(e) => {
                tracing::warn!(err = %e, "store WebSocket read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    // Dropping the senders fails every waiting commit.
    pending.lock().clear();
    drop(feed_tx);
    tracing::info!("store reader task exiting");
}

/// Hands a commit reply to whoever is waiting for it.
fn resolve(pending: &PendingCommits, request_id: RequestId, result: Result<(), StoreError>) {
    match pending.lock().remove(&request_id) {
        Some(waiter) => {
            let _ = waiter.send(result);
        }
        None => tracing::debug!(request_id, "reply for unknown or expired commit"),
    }
}

/// Map a `tokio_tungstenite` connection error to a [`StoreError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> StoreError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => StoreError::Unavailable(io_err.to_string()),
        WsError::Tls(_) => StoreError::Unavailable(format!("TLS error: {err}")),
        WsError::Http(response) => {
            StoreError::Unavailable(format!("store HTTP error: status {}", response.status()))
        }
        other => StoreError::Unavailable(format!("store connection error: {other}")),
    }
}
