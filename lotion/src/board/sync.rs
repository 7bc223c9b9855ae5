//! Persisting reorders as atomic write batches.

use std::sync::Arc;

use lotion_proto::batch::{TaskPatch, WriteBatch};
use lotion_proto::board::Task;

use super::planner::ReorderPlan;
use crate::notify::{Notifier, SAVE_ORDER_FAILED};
use crate::store::{StoreError, TaskStore};

/// Builds the batch that persists `plan` after it was applied.
///
/// `before` is the task list the plan was made from and `after` the
/// optimistic result. Only tasks of the new sequence whose column or order
/// actually changed are written, except the active task, which is always
/// included.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn build_batch(before: &[Task], plan: &ReorderPlan, after: &[Task]) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for task in after.iter().filter(|t| t.column == plan.target_column) {
        let previous = before.iter().find(|t| t.id == task.id);
        let is_active = task.id == plan.active;

        let column_changed = previous.is_none_or(|p| p.column != task.column);
        // Exact comparison: keys are copied, never computed twice.
        let order_changed = previous.is_none_or(|p| p.order != task.order);
        if !(is_active || column_changed || order_changed) {
            continue;
        }

        batch.update_task(
            task.id.clone(),
            TaskPatch {
                column: column_changed.then_some(task.column),
                order: Some(task.order),
                ..TaskPatch::default()
            },
        );
    }
    batch
}

/// Commits reorder batches and turns failures into notifications.
///
/// A failed write is not retried. The local optimistic state stays as it
/// is until the next live-feed snapshot replaces it.
pub struct SyncWriter<S: TaskStore> {
    store: Arc<S>,
    notifier: Notifier,
}

impl<S: TaskStore> Clone for SyncWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S: TaskStore + 'static> SyncWriter<S> {
    /// Create a writer committing to `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Commit `batch`, reporting a failure to the user.
    ///
    /// The result is returned for callers that want it; the UI path ignores
    /// it because the notification is the user-facing outcome.
    pub async fn persist(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let ops = batch.len();
        match self.store.commit(batch).await {
            Ok(()) => {
                tracing::debug!(ops, "reorder persisted");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(ops, error = %err, "reorder write failed, waiting for live feed");
                self.notifier.error(SAVE_ORDER_FAILED);
                Err(err)
            }
        }
    }

    /// Spawn [`persist`](Self::persist) on the runtime and return at once.
    pub fn dispatch(&self, batch: WriteBatch) -> tokio::task::JoinHandle<Result<(), StoreError>> {
        let writer = self.clone();
        tokio::spawn(async move { writer.persist(batch).await })
    }
}
