//! The board context: session state wired to a store.

use std::sync::Arc;

use lotion_proto::board::{MAX_TASK_TITLE_LENGTH, ProjectId};
use tokio::task::JoinHandle;

use super::order::OrderKeys;
use super::session::{BoardEvent, BoardSession};
use super::sync::SyncWriter;
use crate::notify::Notifier;
use crate::store::{StoreError, TaskStore};

/// One open board: its session, the store it writes to, and the writer
/// that persists reorders.
///
/// Several boards may share one store; each has its own session.
pub struct Board<S: TaskStore> {
    pub(super) store: Arc<S>,
    pub(super) session: BoardSession,
    pub(super) writer: SyncWriter<S>,
    pub(super) notifier: Notifier,
    pub(super) max_title_len: usize,
}

impl<S: TaskStore + 'static> Board<S> {
    /// Creates a board showing `project_id`.
    #[must_use]
    pub fn new(store: Arc<S>, project_id: ProjectId, keys: OrderKeys, notifier: Notifier) -> Self {
        Self {
            writer: SyncWriter::new(Arc::clone(&store), notifier.clone()),
            store,
            session: BoardSession::new(project_id, keys),
            notifier,
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }

    /// Sets the maximum task title length, in characters.
    #[must_use]
    pub fn with_max_title_len(mut self, max: usize) -> Self {
        self.max_title_len = max;
        self
    }

    /// Applies `event` and, if it produced a write, dispatches it.
    ///
    /// The local state is updated before this returns; the write runs in
    /// the background. The returned handle resolves with its outcome.
    pub fn handle(&mut self, event: BoardEvent) -> Option<JoinHandle<Result<(), StoreError>>> {
        let batch = self.session.handle(event)?;
        if batch.is_empty() {
            return None;
        }
        Some(self.writer.dispatch(batch))
    }

    /// Shows another project. The caller must follow its live feed.
    pub fn switch_project(&mut self, project_id: ProjectId) {
        tracing::info!(project_id = %project_id, "switching project");
        self.session.switch_project(project_id);
    }

    /// Read access to the session state.
    #[must_use]
    pub const fn session(&self) -> &BoardSession {
        &self.session
    }

    /// The store this board writes to.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }
}
