//! Remote document store abstraction for Lotion.
//!
//! Defines the [`TaskStore`] trait the board writes through and reads live
//! feeds from. Concrete implementations include:
//! - [`memory::InMemoryStore`]: in-process store for offline use and tests
//! - [`remote::RemoteStore`]: WebSocket client for `lotion-store`

pub mod memory;
pub mod remote;

use lotion_proto::batch::WriteBatch;
use lotion_proto::board::ProjectId;
use lotion_proto::store::{FeedKey, FeedSnapshot};
use tokio::sync::broadcast;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store refused the batch; nothing from it was committed.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// No acknowledgment arrived in time.
    #[error("store operation timed out")]
    Timeout,

    /// The connection to the store has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

/// Async document store used by the board.
///
/// Commits are atomic: either every operation of a batch is applied or
/// none is. Live feeds deliver full, order-sorted snapshots and are the
/// only authority on what the store holds.
pub trait TaskStore: Send + Sync {
    /// Commit `batch` atomically.
    ///
    /// Resolves once the store has acknowledged or refused the batch.
    fn commit(
        &self,
        batch: WriteBatch,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Start following one live feed.
    fn subscribe(
        &self,
        key: FeedKey,
    ) -> impl std::future::Future<Output = Result<LiveFeed, StoreError>> + Send;

    /// Stop following one live feed.
    ///
    /// Local [`LiveFeed`]s filter by key on their own; this only tells a
    /// remote store to stop pushing. The default does nothing.
    fn unsubscribe(
        &self,
        key: FeedKey,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        let _ = key;
        async { Ok(()) }
    }

    /// Whether the store can still be reached.
    ///
    /// Stores without a connection are always reachable.
    fn is_connected(&self) -> bool {
        true
    }

    /// Follow the task list of `project_id`.
    fn subscribe_tasks(
        &self,
        project_id: &ProjectId,
    ) -> impl std::future::Future<Output = Result<LiveFeed, StoreError>> + Send {
        self.subscribe(FeedKey::Tasks(project_id.clone()))
    }

    /// Follow the project list.
    fn subscribe_projects(
        &self,
    ) -> impl std::future::Future<Output = Result<LiveFeed, StoreError>> + Send {
        self.subscribe(FeedKey::Projects)
    }
}

/// A subscription to one live feed.
///
/// Yields snapshots for its own key only, oldest first. A snapshot that
/// was current at subscribe time, if the store provides one, comes first.
#[derive(Debug)]
pub struct LiveFeed {
    key: FeedKey,
    initial: Option<FeedSnapshot>,
    rx: broadcast::Receiver<FeedSnapshot>,
}

impl LiveFeed {
    /// Wraps a broadcast receiver shared by every feed of one store.
    #[must_use]
    pub const fn new(
        key: FeedKey,
        initial: Option<FeedSnapshot>,
        rx: broadcast::Receiver<FeedSnapshot>,
    ) -> Self {
        Self { key, initial, rx }
    }

    /// The feed this subscription follows.
    #[must_use]
    pub const fn key(&self) -> &FeedKey {
        &self.key
    }

    /// Waits for the next snapshot of this feed.
    ///
    /// Returns `None` once the store has gone away.
    pub async fn next(&mut self) -> Option<FeedSnapshot> {
        if let Some(snapshot) = self.initial.take() {
            return Some(snapshot);
        }
        loop {
            match self.rx.recv().await {
                Ok(snapshot) if snapshot.key() == self.key => return Some(snapshot),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Snapshots are full state, so the next one catches up.
                    tracing::warn!(feed = ?self.key, skipped, "live feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
