//! In-process document store.
//!
//! [`InMemoryStore`] keeps a [`Workspace`] behind a mutex and fans out
//! snapshots on a broadcast channel, exactly like the server does. It backs
//! the offline mode of the TUI and lets tests simulate store outages with
//! [`InMemoryStore::set_fail_commits`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lotion_proto::batch::{WriteBatch, Workspace};
use lotion_proto::store::{FeedKey, FeedSnapshot};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::{LiveFeed, StoreError, TaskStore};

/// Default capacity of the snapshot broadcast channel.
const FEED_BUFFER: usize = 256;

/// An in-process [`TaskStore`].
pub struct InMemoryStore {
    workspace: Mutex<Workspace>,
    feed_tx: broadcast::Sender<FeedSnapshot>,
    fail_commits: AtomicBool,
    commits: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_workspace(Workspace::new())
    }

    /// Creates a store seeded with `workspace`.
    #[must_use]
    pub fn with_workspace(workspace: Workspace) -> Self {
        let (feed_tx, _) = broadcast::channel(FEED_BUFFER);
        Self {
            workspace: Mutex::new(workspace),
            feed_tx,
            fail_commits: AtomicBool::new(false),
            commits: AtomicUsize::new(0),
        }
    }

    /// Makes every following commit fail with [`StoreError::Unavailable`].
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::Relaxed);
    }

    /// Number of batches committed successfully so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }

    /// Current snapshot of one feed.
    #[must_use]
    pub fn snapshot(&self, key: &FeedKey) -> FeedSnapshot {
        self.workspace.lock().snapshot(key)
    }

    /// A copy of every stored document.
    #[must_use]
    pub fn workspace(&self) -> Workspace {
        self.workspace.lock().clone()
    }

    /// Pushes the current snapshot of `key` to every subscriber.
    pub fn republish(&self, key: &FeedKey) {
        let workspace = self.workspace.lock();
        let _ = self.feed_tx.send(workspace.snapshot(key));
    }
}

impl TaskStore for InMemoryStore {
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::Relaxed) {
            tracing::debug!(ops = batch.len(), "refusing commit: simulated outage");
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }

        let mut workspace = self.workspace.lock();
        let touched = workspace
            .apply(&batch)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        for key in touched.feed_keys() {
            // No receivers is fine: nobody is subscribed yet.
            let _ = self.feed_tx.send(workspace.snapshot(&key));
        }
        drop(workspace);

        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(&self, key: FeedKey) -> Result<LiveFeed, StoreError> {
        let workspace = self.workspace.lock();
        let rx = self.feed_tx.subscribe();
        let initial = workspace.snapshot(&key);
        drop(workspace);
        Ok(LiveFeed::new(key, Some(initial), rx))
    }
}
