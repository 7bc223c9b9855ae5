//! Property tests for atomic batch application.
//!
//! Uses proptest to verify:
//! 1. A batch that references a missing document changes nothing.
//! 2. A batch whose operations are all valid is applied in full.
//! 3. Deleting a project never leaves orphaned tasks behind.

use lotion_proto::batch::{TaskPatch, WriteBatch, WriteOp, Workspace};
use lotion_proto::board::{Column, Project, ProjectId, Task, TaskId};
use proptest::prelude::*;
use uuid::Uuid;

/// Builds a workspace with one project and `count` tasks spaced by 100.
fn seeded(count: usize) -> (Workspace, ProjectId, Vec<TaskId>) {
    let project = Project {
        id: ProjectId::from_uuid(Uuid::from_u128(1)),
        name: "prop".to_string(),
        order: 100.0,
        created_at: 0,
    };
    let tasks: Vec<Task> = (0..count)
        .map(|i| Task {
            id: TaskId::from_uuid(Uuid::from_u128(1000 + i as u128)),
            project_id: project.id.clone(),
            title: format!("task-{i}"),
            column: Column::ALL[i % 3],
            order: (i as f64 + 1.0) * 100.0,
            image_url: None,
        })
        .collect();
    let ids = tasks.iter().map(|t| t.id.clone()).collect();
    let project_id = project.id.clone();
    (
        Workspace::from_documents(vec![project], tasks),
        project_id,
        ids,
    )
}

/// Strategy for an arbitrary column.
fn arb_column() -> impl Strategy<Value = Column> {
    prop_oneof![
        Just(Column::NotStarted),
        Just(Column::InProgress),
        Just(Column::Done),
    ]
}

/// Strategy for a list of (task index, column, order) patches.
fn arb_patches() -> impl Strategy<Value = Vec<(usize, Column, f64)>> {
    prop::collection::vec((0usize..40, arb_column(), 1.0f64..1e6), 1..20)
}

proptest! {
    #[test]
    fn batch_with_missing_target_changes_nothing(
        count in 1usize..20,
        patches in arb_patches(),
        poison_at in 0usize..20,
    ) {
        let (mut ws, _project, ids) = seeded(count);
        let before = ws.clone();

        let mut batch = WriteBatch::new();
        for (i, (idx, column, order)) in patches.iter().enumerate() {
            if i == poison_at.min(patches.len() - 1) {
                batch.update_task(TaskId::new(), TaskPatch {
                    order: Some(1.0),
                    ..TaskPatch::default()
                });
            }
            batch.update_task(ids[idx % ids.len()].clone(), TaskPatch {
                column: Some(*column),
                order: Some(*order),
                ..TaskPatch::default()
            });
        }

        prop_assert!(ws.apply(&batch).is_err());
        prop_assert_eq!(ws, before);
    }

    #[test]
    fn valid_batch_applies_every_patch(
        count in 1usize..20,
        patches in arb_patches(),
    ) {
        let (mut ws, _project, ids) = seeded(count);

        let mut batch = WriteBatch::new();
        let mut expected = std::collections::HashMap::new();
        for (idx, column, order) in &patches {
            let id = ids[idx % ids.len()].clone();
            batch.update_task(id.clone(), TaskPatch {
                column: Some(*column),
                order: Some(*order),
                ..TaskPatch::default()
            });
            expected.insert(id, (*column, *order));
        }

        prop_assert!(ws.apply(&batch).is_ok());
        for (id, (column, order)) in expected {
            let task = ws.task(&id).unwrap();
            prop_assert_eq!(task.column, column);
            prop_assert_eq!(task.order, order);
        }
    }

    #[test]
    fn project_delete_leaves_no_orphans(count in 0usize..30) {
        let (mut ws, project, _ids) = seeded(count);
        let batch = WriteBatch::from(vec![WriteOp::DeleteProject(project.clone())]);
        prop_assert!(ws.apply(&batch).is_ok());
        prop_assert_eq!(ws.task_count(), 0);
        prop_assert!(ws.project(&project).is_none());
    }
}
