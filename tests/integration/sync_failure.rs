//! Integration tests for failed background writes.
//!
//! A refused reorder keeps the optimistic order on screen, tells the user,
//! and is only undone when the live feed delivers the store's state.
//!
//! Verification command: `cargo test --test sync_failure`

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;

use lotion::board::{Board, BoardEvent, DropTarget, OrderKeys};
use lotion::notify::{Notification, NotificationLevel, Notifier, SAVE_ORDER_FAILED};
use lotion::store::StoreError;
use lotion::store::memory::InMemoryStore;
use lotion_proto::batch::Workspace;
use lotion_proto::board::{Column, Project, ProjectId, Task, TaskId};
use lotion_proto::store::FeedKey;
use tokio::sync::mpsc;

fn seeded() -> (Arc<InMemoryStore>, ProjectId, Vec<TaskId>) {
    let project = Project {
        id: ProjectId::new(),
        name: "Work".to_string(),
        order: 100.0,
        created_at: 0,
    };
    let tasks: Vec<Task> = ["A", "B", "C"]
        .iter()
        .zip([100.0, 200.0, 300.0])
        .map(|(title, order)| Task {
            id: TaskId::new(),
            project_id: project.id.clone(),
            title: (*title).to_string(),
            column: Column::NotStarted,
            order,
            image_url: None,
        })
        .collect();
    let ids = tasks.iter().map(|t| t.id.clone()).collect();
    let project_id = project.id.clone();
    let store = Arc::new(InMemoryStore::with_workspace(Workspace::from_documents(
        vec![project],
        tasks,
    )));
    (store, project_id, ids)
}

fn board_over(
    store: &Arc<InMemoryStore>,
    project_id: &ProjectId,
) -> (Board<InMemoryStore>, mpsc::Receiver<Notification>) {
    let (notifier, rx) = Notifier::new(8);
    let mut board = Board::new(
        Arc::clone(store),
        project_id.clone(),
        OrderKeys::default(),
        notifier,
    );
    board.handle(BoardEvent::Snapshot(
        store.snapshot(&FeedKey::Tasks(project_id.clone())),
    ));
    (board, rx)
}

fn titles(board: &Board<InMemoryStore>) -> Vec<String> {
    board
        .session()
        .column(Column::NotStarted)
        .into_iter()
        .map(|t| t.title)
        .collect()
}

#[tokio::test]
async fn refused_write_keeps_optimistic_order_and_notifies() {
    let (store, project_id, ids) = seeded();
    let (mut board, mut notifications) = board_over(&store, &project_id);
    store.set_fail_commits(true);

    board.handle(BoardEvent::DragStart {
        task_id: ids[2].clone(),
    });
    let write = board
        .handle(BoardEvent::DragEnd {
            active: ids[2].clone(),
            over: Some(DropTarget::Task(ids[0].clone())),
        })
        .unwrap();
    let outcome = write.await.unwrap();

    assert!(matches!(outcome, Err(StoreError::Unavailable(_))));
    assert_eq!(titles(&board), vec!["C", "A", "B"]);

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.message, SAVE_ORDER_FAILED);

    // Nothing reached the store.
    let stored: Vec<String> = store
        .workspace()
        .tasks_for(&project_id)
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(stored, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn next_feed_snapshot_reverts_failed_reorder() {
    let (store, project_id, ids) = seeded();
    let (mut board, _notifications) = board_over(&store, &project_id);
    store.set_fail_commits(true);

    let write = board
        .handle(BoardEvent::DragEnd {
            active: ids[0].clone(),
            over: Some(DropTarget::Column(Column::Done)),
        })
        .unwrap();
    assert!(write.await.unwrap().is_err());
    assert_eq!(board.session().column(Column::Done).len(), 1);

    board.handle(BoardEvent::Snapshot(
        store.snapshot(&FeedKey::Tasks(project_id.clone())),
    ));

    assert!(board.session().column(Column::Done).is_empty());
    assert_eq!(titles(&board), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn failed_write_is_not_retried() {
    let (store, project_id, ids) = seeded();
    let (mut board, mut notifications) = board_over(&store, &project_id);
    store.set_fail_commits(true);

    let write = board
        .handle(BoardEvent::DragEnd {
            active: ids[1].clone(),
            over: Some(DropTarget::Task(ids[0].clone())),
        })
        .unwrap();
    assert!(write.await.unwrap().is_err());
    store.set_fail_commits(false);
    tokio::task::yield_now().await;

    assert_eq!(store.commit_count(), 0);
    assert!(notifications.recv().await.is_some());
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn later_reorder_succeeds_after_a_failure() {
    let (store, project_id, ids) = seeded();
    let (mut board, _notifications) = board_over(&store, &project_id);

    store.set_fail_commits(true);
    let write = board
        .handle(BoardEvent::DragEnd {
            active: ids[2].clone(),
            over: Some(DropTarget::Task(ids[0].clone())),
        })
        .unwrap();
    assert!(write.await.unwrap().is_err());

    store.set_fail_commits(false);
    board.handle(BoardEvent::Snapshot(
        store.snapshot(&FeedKey::Tasks(project_id.clone())),
    ));
    let write = board
        .handle(BoardEvent::DragEnd {
            active: ids[1].clone(),
            over: Some(DropTarget::Task(ids[0].clone())),
        })
        .unwrap();
    write.await.unwrap().unwrap();

    let stored: Vec<(String, f64)> = store
        .workspace()
        .tasks_for(&project_id)
        .into_iter()
        .map(|t| (t.title, t.order))
        .collect();
    assert_eq!(
        stored,
        vec![
            ("B".to_string(), 100.0),
            ("A".to_string(), 200.0),
            ("C".to_string(), 300.0),
        ]
    );
}
