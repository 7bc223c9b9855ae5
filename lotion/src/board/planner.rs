//! Reorder planning: turns a drag-end gesture into a new column sequence.
//!
//! Planning is pure. It reads the current task list, never mutates it, and
//! returns `None` for every drop that should leave the board untouched.

use std::fmt;

use lotion_proto::board::{Column, Task, TaskId, sort_by_order};

/// Where a dragged task was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Released over a column's empty area: append to the end.
    Column(Column),
    /// Released over another task: take its position.
    Task(TaskId),
}

impl DropTarget {
    /// Interprets a raw drop-target id from the gesture source.
    ///
    /// Column ids (`"not-started"`, `"in-progress"`, `"done"`) become
    /// [`DropTarget::Column`]; anything that parses as a task id becomes
    /// [`DropTarget::Task`]. Returns `None` for unrecognised ids.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        if let Some(column) = Column::from_id(id) {
            return Some(Self::Column(column));
        }
        id.parse().ok().map(Self::Task)
    }
}

impl fmt::Display for DropTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(column) => write!(f, "{}", column.as_id()),
            Self::Task(id) => write!(f, "{id}"),
        }
    }
}

/// The outcome of planning one drop.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderPlan {
    /// The task that was dragged.
    pub active: TaskId,
    /// The column the task lands in.
    pub target_column: Column,
    /// The complete new sequence of `target_column`, first to last.
    ///
    /// Order keys are still the old ones; the active task already carries
    /// its new column.
    pub sequence: Vec<Task>,
    /// Whether the active task left its previous column.
    pub column_changed: bool,
}

/// Plans the drop of `active` onto `target`.
///
/// Returns `None` when the drop is a no-op: the active task or the target
/// task is no longer on the board, or a same-column drop lands on the
/// position the task already holds.
#[must_use]
pub fn plan_reorder(tasks: &[Task], active: &TaskId, target: &DropTarget) -> Option<ReorderPlan> {
    let Some(active_task) = tasks.iter().find(|t| &t.id == active) else {
        tracing::debug!(task_id = %active, "dragged task no longer on the board");
        return None;
    };

    let target_column = match target {
        DropTarget::Column(column) => *column,
        DropTarget::Task(id) => {
            let Some(over) = tasks.iter().find(|t| &t.id == id) else {
                tracing::debug!(target = %id, "drop target no longer on the board");
                return None;
            };
            over.column
        }
    };

    let mut sequence = column_tasks(tasks, target_column);

    if active_task.column == target_column {
        let old_index = sequence.iter().position(|t| &t.id == active)?;
        let new_index = match target {
            DropTarget::Task(id) => sequence.iter().position(|t| &t.id == id)?,
            DropTarget::Column(_) => sequence.len() - 1,
        };
        if old_index == new_index {
            return None;
        }
        array_move(&mut sequence, old_index, new_index);
        return Some(ReorderPlan {
            active: active.clone(),
            target_column,
            sequence,
            column_changed: false,
        });
    }

    sequence.retain(|t| &t.id != active);
    let insert_index = match target {
        DropTarget::Task(id) => sequence
            .iter()
            .position(|t| &t.id == id)
            .unwrap_or(sequence.len()),
        DropTarget::Column(_) => sequence.len(),
    };
    let mut moved = active_task.clone();
    moved.column = target_column;
    sequence.insert(insert_index, moved);

    Some(ReorderPlan {
        active: active.clone(),
        target_column,
        sequence,
        column_changed: true,
    })
}

/// Returns the tasks of `column`, sorted by order key.
#[must_use]
pub fn column_tasks(tasks: &[Task], column: Column) -> Vec<Task> {
    let mut out: Vec<Task> = tasks.iter().filter(|t| t.column == column).cloned().collect();
    sort_by_order(&mut out);
    out
}

/// Moves the item at `from` to `to`, shifting everything in between by one.
///
/// Out-of-range indices leave `items` unchanged.
pub fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from == to || from >= items.len() || to >= items.len() {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}
