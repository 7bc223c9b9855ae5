//! Store server core: WebSocket handler, commit handling, and live-feed
//! forwarding.
//!
//! Each connection gets a writer task draining an outbound channel, a reader
//! loop handling [`StoreMessage`] requests, and one forwarding task per
//! subscribed feed. Forwarding tasks push the feed's current snapshot first
//! and then every later snapshot of that feed. They live in a [`JoinSet`]
//! owned by the reader, so they stop whichever half of the connection ends
//! first.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use lotion_proto::batch::WriteBatch;
use lotion_proto::store::{self, FeedKey, FeedSnapshot, RequestId, StoreMessage};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinSet};

use crate::documents::DocumentStore;

/// Feed forwarders of one connection, at most one per [`FeedKey`].
///
/// Dropping this aborts every forwarder.
#[derive(Default)]
struct Feeds {
    tasks: JoinSet<()>,
    by_key: HashMap<FeedKey, AbortHandle>,
}

impl Feeds {
    /// Runs `forwarder` for `key`, replacing any forwarder already running.
    fn start<F>(&mut self, key: FeedKey, forwarder: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.stop(&key);
        let handle = self.tasks.spawn(forwarder);
        self.by_key.insert(key, handle);
        // Reap forwarders that already finished or were replaced.
        while self.tasks.try_join_next().is_some() {}
    }

    /// Stops the forwarder for `key`, if one is running.
    fn stop(&mut self, key: &FeedKey) {
        if let Some(handle) = self.by_key.remove(key) {
            handle.abort();
        }
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// The connection lifecycle:
/// 1. Spawn the writer task.
/// 2. Process requests until the client closes or the socket fails.
/// 3. Stop whichever task is still running. The reader's `Feeds` go with
///    it, which aborts every forwarder of this connection.
pub async fn handle_socket(socket: WebSocket, documents: Arc<DocumentStore>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!("WebSocket write failed");
                break;
            }
        }
    });

    let reader_tx = tx.clone();
    let mut read_task = tokio::spawn(async move {
        let mut feeds = Feeds::default();
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_binary_message(&data, &documents, &reader_tx, &mut feeds).await;
                }
                Message::Close(_) => {
                    tracing::info!("received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
        feeds.tasks.shutdown().await;
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    tracing::info!("client disconnected");
}

/// Handles one binary frame from a client.
async fn handle_binary_message(
    data: &[u8],
    documents: &Arc<DocumentStore>,
    tx: &mpsc::UnboundedSender<Message>,
    feeds: &mut Feeds,
) {
    let msg = match store::decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode message");
            send(
                tx,
                &StoreMessage::Error {
                    reason: format!("malformed message: {e}"),
                },
            );
            return;
        }
    };

    match msg {
        StoreMessage::Subscribe { project_id } => {
            tracing::debug!(project_id = %project_id, "subscribe");
            start_feed(FeedKey::Tasks(project_id), documents, tx, feeds).await;
        }
        StoreMessage::SubscribeProjects => {
            tracing::debug!("subscribe to project list");
            start_feed(FeedKey::Projects, documents, tx, feeds).await;
        }
        StoreMessage::Unsubscribe { project_id } => {
            feeds.stop(&FeedKey::Tasks(project_id));
        }
        StoreMessage::Commit { request_id, batch } => {
            handle_commit(request_id, &batch, documents, tx).await;
        }
        other => {
            tracing::warn!(msg = ?other, "unexpected message type from client");
        }
    }
}

/// Commits a batch and answers with `Committed` or `Rejected`.
async fn handle_commit(
    request_id: RequestId,
    batch: &WriteBatch,
    documents: &DocumentStore,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let reply = match documents.commit(batch).await {
        Ok(_) => StoreMessage::Committed { request_id },
        Err(e) => {
            tracing::warn!(request_id, ops = batch.len(), error = %e, "commit rejected");
            StoreMessage::Rejected {
                request_id,
                reason: e.to_string(),
            }
        }
    };
    send(tx, &reply);
}

/// Starts (or restarts) forwarding one feed to this connection.
async fn start_feed(
    key: FeedKey,
    documents: &Arc<DocumentStore>,
    tx: &mpsc::UnboundedSender<Message>,
    feeds: &mut Feeds,
) {
    feeds.stop(&key);
    let (initial, rx) = documents.subscribe(&key).await;
    let forwarder = forward_feed(
        key.clone(),
        initial,
        rx,
        Arc::clone(documents),
        tx.clone(),
    );
    feeds.start(key, forwarder);
}

/// Pushes the initial snapshot, then every later snapshot of `key`.
///
/// On lag the feed is re-subscribed so the client always ends on the latest
/// state rather than a stale retained snapshot.
async fn forward_feed(
    key: FeedKey,
    initial: FeedSnapshot,
    mut rx: broadcast::Receiver<FeedSnapshot>,
    documents: Arc<DocumentStore>,
    tx: mpsc::UnboundedSender<Message>,
) {
    if !send(&tx, &initial.into()) {
        return;
    }
    loop {
        match rx.recv().await {
            Ok(snapshot) => {
                if snapshot.key() == key && !send(&tx, &snapshot.into()) {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, feed = ?key, "feed lagged, resubscribing");
                let (current, fresh) = documents.subscribe(&key).await;
                rx = fresh;
                if !send(&tx, &current.into()) {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Encodes and queues a message; returns `false` once the connection is gone.
fn send(tx: &mpsc::UnboundedSender<Message>, msg: &StoreMessage) -> bool {
    match store::encode(msg) {
        Ok(bytes) => tx.send(Message::Binary(bytes.into())).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode outgoing message");
            true
        }
    }
}

/// Axum handler that upgrades HTTP to WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(documents): State<Arc<DocumentStore>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, documents))
}

/// Starts the store server on `addr`, returning the bound address and the
/// server task handle.
///
/// # Errors
///
/// Returns an error if the listener cannot bind.
pub async fn start_server(
    addr: &str,
    documents: Arc<DocumentStore>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(documents);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "store server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts an in-memory store server on `127.0.0.1:0` for testing.
#[cfg(test)]
pub async fn start_test_server() -> (
    std::net::SocketAddr,
    Arc<DocumentStore>,
    tokio::task::JoinHandle<()>,
) {
    let documents = Arc::new(DocumentStore::new());
    let (addr, handle) = start_server("127.0.0.1:0", Arc::clone(&documents))
        .await
        .expect("failed to start test server");
    (addr, documents, handle)
}
