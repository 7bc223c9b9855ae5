//! Optimistic application of a reorder plan to the local task list.

use lotion_proto::board::Task;

use super::order::OrderKeys;
use super::planner::ReorderPlan;

/// Renumbers `plan.sequence` and merges it into `tasks`.
///
/// Every task in the sequence gets `order = keys.sequential_orders(..)[i]`
/// and `column = plan.target_column`. The previous members of the target
/// column and the active task's old entry are dropped before the updated
/// records are appended, so the result holds each task exactly once.
#[must_use]
pub fn apply_plan(tasks: &[Task], plan: &ReorderPlan, keys: &OrderKeys) -> Vec<Task> {
    let orders = keys.sequential_orders(plan.sequence.len());
    let updated = plan.sequence.iter().zip(orders).map(|(task, order)| Task {
        column: plan.target_column,
        order,
        ..task.clone()
    });

    tasks
        .iter()
        .filter(|t| t.column != plan.target_column && t.id != plan.active)
        .cloned()
        .chain(updated)
        .collect()
}
