//! Property tests for drag-and-drop ordering.
//!
//! Uses proptest to verify, for arbitrary boards and drops:
//! 1. The target column ends up with unique, evenly spaced, increasing keys.
//! 2. Only the dropped task changes column; nothing is lost or duplicated.
//! 3. The write batch, applied to the store, reproduces the local state.
//! 4. Dropping a task onto itself changes nothing and writes nothing.
//! 5. Repeating a drop onto the same column writes nothing.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::collections::HashMap;

use lotion::board::{BoardEvent, BoardSession, DropTarget, OrderKeys};
use lotion_proto::batch::Workspace;
use lotion_proto::board::{Column, Project, ProjectId, Task, TaskId};
use lotion_proto::store::FeedSnapshot;
use proptest::prelude::*;
use uuid::Uuid;

/// Strategy for an arbitrary column.
fn arb_column() -> impl Strategy<Value = Column> {
    prop_oneof![
        Just(Column::NotStarted),
        Just(Column::InProgress),
        Just(Column::Done),
    ]
}

/// Up to 15 tasks spread over the columns with distinct, uneven keys.
fn arb_board() -> impl Strategy<Value = Vec<(Column, u32)>> {
    prop::collection::vec((arb_column(), 1u32..10_000), 1..15)
}

/// Which task is dragged, and whether it lands on a task or a column.
#[derive(Debug, Clone)]
enum Landing {
    OnTask(usize),
    OnColumn(Column),
}

fn arb_landing() -> impl Strategy<Value = (usize, Landing)> {
    (
        any::<usize>(),
        prop_oneof![
            any::<usize>().prop_map(Landing::OnTask),
            arb_column().prop_map(Landing::OnColumn),
        ],
    )
}

fn project_id() -> ProjectId {
    ProjectId::from_uuid(Uuid::from_u128(7))
}

fn build_tasks(layout: &[(Column, u32)]) -> Vec<Task> {
    layout
        .iter()
        .enumerate()
        .map(|(i, (column, key))| Task {
            id: TaskId::from_uuid(Uuid::from_u128(100 + i as u128)),
            project_id: project_id(),
            title: format!("task-{i}"),
            column: *column,
            order: f64::from(key * 16 + i as u32),
            image_url: None,
        })
        .collect()
}

fn session_with(tasks: &[Task]) -> BoardSession {
    let mut session = BoardSession::new(project_id(), OrderKeys::default());
    session.handle(BoardEvent::Snapshot(FeedSnapshot::Tasks {
        project_id: project_id(),
        tasks: tasks.to_vec(),
    }));
    session
}

fn target_of(tasks: &[Task], landing: &Landing) -> DropTarget {
    match landing {
        Landing::OnTask(i) => DropTarget::Task(tasks[i % tasks.len()].id.clone()),
        Landing::OnColumn(column) => DropTarget::Column(*column),
    }
}

fn placement(tasks: &[Task]) -> HashMap<TaskId, (Column, f64)> {
    tasks
        .iter()
        .map(|t| (t.id.clone(), (t.column, t.order)))
        .collect()
}

proptest! {
    #[test]
    fn target_column_keys_are_evenly_spaced(layout in arb_board(), (active, landing) in arb_landing()) {
        let tasks = build_tasks(&layout);
        let active = tasks[active % tasks.len()].id.clone();
        let target = target_of(&tasks, &landing);
        let mut session = session_with(&tasks);

        let batch = session.handle(BoardEvent::DragEnd { active: active.clone(), over: Some(target) });
        prop_assume!(batch.is_some());

        let column = session.task(&active).unwrap().column;
        let orders: Vec<f64> = session.column(column).iter().map(|t| t.order).collect();
        let expected: Vec<f64> = (1..=orders.len()).map(|i| i as f64 * 100.0).collect();
        prop_assert_eq!(orders, expected);
    }

    #[test]
    fn only_the_dropped_task_changes_column(layout in arb_board(), (active, landing) in arb_landing()) {
        let tasks = build_tasks(&layout);
        let active = tasks[active % tasks.len()].id.clone();
        let target = target_of(&tasks, &landing);
        let mut session = session_with(&tasks);

        session.handle(BoardEvent::DragEnd { active: active.clone(), over: Some(target.clone()) });

        prop_assert_eq!(session.tasks().len(), tasks.len());
        let after = placement(session.tasks());
        let expected_column = match &target {
            DropTarget::Column(column) => *column,
            DropTarget::Task(id) => tasks.iter().find(|t| &t.id == id).unwrap().column,
        };
        for task in &tasks {
            let (column, _) = after[&task.id];
            if task.id == active {
                prop_assert_eq!(column, expected_column);
            } else {
                prop_assert_eq!(column, task.column);
            }
        }
    }

    #[test]
    fn batch_reproduces_local_state(layout in arb_board(), (active, landing) in arb_landing()) {
        let tasks = build_tasks(&layout);
        let active = tasks[active % tasks.len()].id.clone();
        let target = target_of(&tasks, &landing);
        let mut session = session_with(&tasks);

        let Some(batch) = session.handle(BoardEvent::DragEnd { active, over: Some(target) }) else {
            return Ok(());
        };

        let project = Project {
            id: project_id(),
            name: "prop".to_string(),
            order: 100.0,
            created_at: 0,
        };
        let mut workspace = Workspace::from_documents(vec![project], tasks.clone());
        workspace.apply(&batch).unwrap();

        prop_assert_eq!(placement(&workspace.tasks_for(&project_id())), placement(session.tasks()));
    }

    #[test]
    fn drop_on_itself_is_a_no_op(layout in arb_board(), active in any::<usize>()) {
        let tasks = build_tasks(&layout);
        let active = tasks[active % tasks.len()].id.clone();
        let mut session = session_with(&tasks);
        let before = placement(session.tasks());

        let batch = session.handle(BoardEvent::DragEnd {
            active: active.clone(),
            over: Some(DropTarget::Task(active)),
        });

        prop_assert!(batch.is_none());
        prop_assert_eq!(placement(session.tasks()), before);
    }

    #[test]
    fn repeating_a_column_drop_writes_nothing_new(layout in arb_board(), active in any::<usize>(), column in arb_column()) {
        let tasks = build_tasks(&layout);
        let active = tasks[active % tasks.len()].id.clone();
        let mut session = session_with(&tasks);

        session.handle(BoardEvent::DragEnd { active: active.clone(), over: Some(DropTarget::Column(column)) });
        let settled = placement(session.tasks());

        // The task is already last in that column now.
        let again = session.handle(BoardEvent::DragEnd { active, over: Some(DropTarget::Column(column)) });
        prop_assert!(again.is_none());
        prop_assert_eq!(placement(session.tasks()), settled);
    }
}
