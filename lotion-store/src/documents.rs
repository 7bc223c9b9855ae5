//! Authoritative document set with atomic commits and live-feed fan-out.
//!
//! [`DocumentStore`] owns the single [`Workspace`] of the server. Every commit
//! is staged, optionally persisted, and only then swapped in; the snapshots
//! of each affected feed are broadcast while the write lock is still held so
//! subscribers observe commits in commit order.

use std::path::{Path, PathBuf};

use lotion_proto::batch::{BatchError, Touched, WriteBatch, Workspace};
use lotion_proto::board::{Project, Task};
use lotion_proto::store::{FeedKey, FeedSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};

/// Default maximum number of operations accepted in one batch.
const DEFAULT_MAX_BATCH_OPS: usize = 500;

/// Default capacity of the snapshot broadcast channel.
const DEFAULT_FEED_BUFFER: usize = 256;

/// Errors that can occur while committing or loading documents.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The batch exceeds the configured operation limit.
    #[error("batch too large: {ops} operations (max {max})")]
    TooLarge {
        /// Operations in the rejected batch.
        ops: usize,
        /// Configured maximum.
        max: usize,
    },

    /// An operation in the batch could not be applied.
    #[error("batch rejected: {0}")]
    Batch(#[from] BatchError),

    /// Reading or writing the data file failed.
    #[error("data file {path}: {source}")]
    Io {
        /// Data file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The data file could not be encoded or decoded.
    #[error("data file encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk layout of the document set.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredDocuments {
    projects: Vec<Project>,
    tasks: Vec<Task>,
}

/// The server's authoritative document set.
pub struct DocumentStore {
    workspace: RwLock<Workspace>,
    feed_tx: broadcast::Sender<FeedSnapshot>,
    data_file: Option<PathBuf>,
    max_batch_ops: usize,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// Creates an empty, memory-only store with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_workspace(Workspace::new(), DEFAULT_MAX_BATCH_OPS, DEFAULT_FEED_BUFFER)
    }

    /// Creates a memory-only store around an existing workspace.
    #[must_use]
    pub fn with_workspace(workspace: Workspace, max_batch_ops: usize, feed_buffer: usize) -> Self {
        let (feed_tx, _) = broadcast::channel(feed_buffer.max(1));
        Self {
            workspace: RwLock::new(workspace),
            feed_tx,
            data_file: None,
            max_batch_ops,
        }
    }

    /// Opens a store persisted to `path`, loading it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the file exists but cannot be read or
    /// decoded.
    pub fn open(
        path: &Path,
        max_batch_ops: usize,
        feed_buffer: usize,
    ) -> Result<Self, DocumentError> {
        let workspace = match std::fs::read_to_string(path) {
            Ok(contents) => {
                let stored: StoredDocuments = serde_json::from_str(&contents)?;
                tracing::info!(
                    path = %path.display(),
                    projects = stored.projects.len(),
                    tasks = stored.tasks.len(),
                    "loaded documents"
                );
                Workspace::from_documents(stored.projects, stored.tasks)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Workspace::new(),
            Err(source) => {
                return Err(DocumentError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let mut store = Self::with_workspace(workspace, max_batch_ops, feed_buffer);
        store.data_file = Some(path.to_path_buf());
        Ok(store)
    }

    /// Commits `batch` atomically and broadcasts the affected feeds.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the batch is too large, any operation is
    /// invalid, or persisting fails. Nothing is committed in that case.
    pub async fn commit(&self, batch: &WriteBatch) -> Result<Touched, DocumentError> {
        if batch.len() > self.max_batch_ops {
            return Err(DocumentError::TooLarge {
                ops: batch.len(),
                max: self.max_batch_ops,
            });
        }

        let mut workspace = self.workspace.write().await;
        let mut staged = workspace.clone();
        let touched = staged.apply(batch)?;
        if let Some(path) = &self.data_file {
            persist(path, &staged).await?;
        }
        *workspace = staged;

        for key in touched.feed_keys() {
            // No receivers is fine: nobody is subscribed yet.
            let _ = self.feed_tx.send(workspace.snapshot(&key));
        }
        drop(workspace);

        tracing::debug!(ops = batch.len(), "batch committed");
        Ok(touched)
    }

    /// Returns the current snapshot of `key` together with a receiver for
    /// every later snapshot.
    ///
    /// Both are taken under the same lock, so the receiver never yields a
    /// snapshot older than the one returned.
    pub async fn subscribe(&self, key: &FeedKey) -> (FeedSnapshot, broadcast::Receiver<FeedSnapshot>) {
        let workspace = self.workspace.read().await;
        let rx = self.feed_tx.subscribe();
        (workspace.snapshot(key), rx)
    }

    /// Returns the current snapshot of `key`.
    pub async fn snapshot(&self, key: &FeedKey) -> FeedSnapshot {
        self.workspace.read().await.snapshot(key)
    }

    /// Number of live receivers of the snapshot broadcast.
    #[must_use]
    pub fn feed_receivers(&self) -> usize {
        self.feed_tx.receiver_count()
    }
}

/// Writes the workspace to `path` via a temporary file and rename.
///
/// Runs under the commit's write lock, so a second commit cannot persist
/// over this one.
async fn persist(path: &Path, workspace: &Workspace) -> Result<(), DocumentError> {
    let stored = StoredDocuments {
        projects: workspace.projects(),
        tasks: workspace.all_tasks().cloned().collect(),
    };
    let json = serde_json::to_string_pretty(&stored)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|source| DocumentError::Io {
            path: tmp.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })
}
