//! Integration tests for drag-and-drop reordering against an in-process store.
//!
//! Drives a [`Board`] the way the TUI does (drag start, drag end, feed
//! snapshots) and checks both the optimistic state and what was persisted.
//!
//! Verification command: `cargo test --test reorder`

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;

use lotion::board::{Board, BoardEvent, DropTarget, OrderKeys};
use lotion::notify::Notifier;
use lotion::store::TaskStore;
use lotion::store::memory::InMemoryStore;
use lotion_proto::batch::Workspace;
use lotion_proto::board::{Column, Project, ProjectId, Task, TaskId};
use lotion_proto::store::{FeedKey, FeedSnapshot};

// =============================================================================
// Test helpers
// =============================================================================

struct Fixture {
    board: Board<InMemoryStore>,
    store: Arc<InMemoryStore>,
    project_id: ProjectId,
}

fn task(project_id: &ProjectId, title: &str, column: Column, order: f64) -> Task {
    Task {
        id: TaskId::new(),
        project_id: project_id.clone(),
        title: title.to_string(),
        column,
        order,
        image_url: None,
    }
}

/// Builds a board over a store holding one project with `tasks`, and
/// loads the store's snapshots into the session.
fn fixture(build: impl FnOnce(&ProjectId) -> Vec<Task>) -> Fixture {
    let project = Project {
        id: ProjectId::new(),
        name: "Home".to_string(),
        order: 100.0,
        created_at: 0,
    };
    let project_id = project.id.clone();
    let tasks = build(&project_id);
    let store = Arc::new(InMemoryStore::with_workspace(Workspace::from_documents(
        vec![project],
        tasks,
    )));
    let (notifier, _rx) = Notifier::new(8);
    let mut board = Board::new(
        Arc::clone(&store),
        project_id.clone(),
        OrderKeys::default(),
        notifier,
    );
    board.handle(BoardEvent::Snapshot(store.snapshot(&FeedKey::Projects)));
    board.handle(BoardEvent::Snapshot(
        store.snapshot(&FeedKey::Tasks(project_id.clone())),
    ));
    Fixture {
        board,
        store,
        project_id,
    }
}

fn id_of(fx: &Fixture, title: &str) -> TaskId {
    fx.board
        .session()
        .tasks()
        .iter()
        .find(|t| t.title == title)
        .map(|t| t.id.clone())
        .unwrap()
}

/// `(title, order)` pairs of one column, in display order.
fn column_view(tasks: &[Task], column: Column) -> Vec<(String, f64)> {
    tasks
        .iter()
        .filter(|t| t.column == column)
        .map(|t| (t.title.clone(), t.order))
        .collect()
}

fn persisted(fx: &Fixture, column: Column) -> Vec<(String, f64)> {
    let tasks = fx.store.workspace().tasks_for(&fx.project_id);
    column_view(&tasks, column)
}

/// Performs a full drag and waits for the background write.
async fn drag(fx: &mut Fixture, active: &TaskId, over: Option<DropTarget>) -> bool {
    assert!(
        fx.board
            .handle(BoardEvent::DragStart {
                task_id: active.clone(),
            })
            .is_none()
    );
    let write = fx.board.handle(BoardEvent::DragEnd {
        active: active.clone(),
        over,
    });
    match write {
        Some(handle) => {
            handle.await.unwrap().unwrap();
            true
        }
        None => false,
    }
}

fn owned(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
    pairs.iter().map(|(t, o)| ((*t).to_string(), *o)).collect()
}

// =============================================================================
// Same-column reorder
// =============================================================================

#[tokio::test]
async fn dropping_onto_earlier_task_moves_before_it() {
    let mut fx = fixture(|p| {
        vec![
            task(p, "A", Column::NotStarted, 100.0),
            task(p, "B", Column::NotStarted, 200.0),
            task(p, "C", Column::NotStarted, 300.0),
        ]
    });
    let a = id_of(&fx, "A");
    let b = id_of(&fx, "B");

    assert!(drag(&mut fx, &b, Some(DropTarget::Task(a))).await);

    let expected = owned(&[("B", 100.0), ("A", 200.0), ("C", 300.0)]);
    assert_eq!(
        column_view(fx.board.session().tasks(), Column::NotStarted),
        expected
    );
    assert_eq!(persisted(&fx, Column::NotStarted), expected);
    assert_eq!(fx.store.commit_count(), 1);
}

#[tokio::test]
async fn dropping_onto_later_task_takes_its_slot() {
    let mut fx = fixture(|p| {
        vec![
            task(p, "A", Column::InProgress, 100.0),
            task(p, "B", Column::InProgress, 200.0),
            task(p, "C", Column::InProgress, 300.0),
        ]
    });
    let a = id_of(&fx, "A");
    let c = id_of(&fx, "C");

    assert!(drag(&mut fx, &a, Some(DropTarget::Task(c))).await);

    assert_eq!(
        persisted(&fx, Column::InProgress),
        owned(&[("B", 100.0), ("C", 200.0), ("A", 300.0)])
    );
}

#[tokio::test]
async fn uneven_keys_are_renumbered_on_reorder() {
    let mut fx = fixture(|p| {
        vec![
            task(p, "A", Column::Done, 7.5),
            task(p, "B", Column::Done, 8.0),
            task(p, "C", Column::Done, 950.0),
        ]
    });
    let a = id_of(&fx, "A");
    let c = id_of(&fx, "C");

    assert!(drag(&mut fx, &c, Some(DropTarget::Task(a))).await);

    assert_eq!(
        persisted(&fx, Column::Done),
        owned(&[("C", 100.0), ("A", 200.0), ("B", 300.0)])
    );
}

// =============================================================================
// Cross-column moves
// =============================================================================

#[tokio::test]
async fn drop_on_empty_column_moves_task_there() {
    let mut fx = fixture(|p| {
        vec![
            task(p, "X", Column::NotStarted, 100.0),
            task(p, "Y", Column::NotStarted, 200.0),
        ]
    });
    let x = id_of(&fx, "X");

    assert!(
        drag(
            &mut fx,
            &x,
            Some(DropTarget::Column(Column::InProgress))
        )
        .await
    );

    assert_eq!(persisted(&fx, Column::InProgress), owned(&[("X", 100.0)]));
    assert_eq!(persisted(&fx, Column::NotStarted), owned(&[("Y", 200.0)]));
    let moved = fx.store.workspace().task(&x).cloned().unwrap();
    assert_eq!(moved.column, Column::InProgress);
}

#[tokio::test]
async fn drop_on_task_in_other_column_inserts_before_it() {
    let mut fx = fixture(|p| {
        vec![
            task(p, "A", Column::NotStarted, 100.0),
            task(p, "P", Column::Done, 100.0),
            task(p, "Q", Column::Done, 200.0),
        ]
    });
    let a = id_of(&fx, "A");
    let q = id_of(&fx, "Q");

    assert!(drag(&mut fx, &a, Some(DropTarget::Task(q))).await);

    assert_eq!(
        persisted(&fx, Column::Done),
        owned(&[("P", 100.0), ("A", 200.0), ("Q", 300.0)])
    );
    assert!(persisted(&fx, Column::NotStarted).is_empty());
}

#[tokio::test]
async fn drop_on_column_appends_to_its_end() {
    let mut fx = fixture(|p| {
        vec![
            task(p, "A", Column::NotStarted, 100.0),
            task(p, "P", Column::Done, 100.0),
            task(p, "Q", Column::Done, 200.0),
        ]
    });
    let a = id_of(&fx, "A");

    assert!(drag(&mut fx, &a, Some(DropTarget::Column(Column::Done))).await);

    assert_eq!(
        persisted(&fx, Column::Done),
        owned(&[("P", 100.0), ("Q", 200.0), ("A", 300.0)])
    );
}

// =============================================================================
// No-ops
// =============================================================================

#[tokio::test]
async fn drop_on_itself_changes_nothing() {
    let mut fx = fixture(|p| {
        vec![
            task(p, "A", Column::NotStarted, 100.0),
            task(p, "B", Column::NotStarted, 200.0),
        ]
    });
    let a = id_of(&fx, "A");
    let before = fx.board.session().tasks().to_vec();

    assert!(!drag(&mut fx, &a, Some(DropTarget::Task(a.clone()))).await);

    assert_eq!(fx.board.session().tasks(), before.as_slice());
    assert_eq!(fx.store.commit_count(), 0);
    assert!(fx.board.session().dragging().is_none());
}

#[tokio::test]
async fn drop_outside_any_target_changes_nothing() {
    let mut fx = fixture(|p| vec![task(p, "A", Column::NotStarted, 100.0)]);
    let a = id_of(&fx, "A");
    let before = fx.board.session().tasks().to_vec();

    assert!(!drag(&mut fx, &a, None).await);

    assert_eq!(fx.board.session().tasks(), before.as_slice());
    assert_eq!(fx.store.commit_count(), 0);
}

#[tokio::test]
async fn cancelled_drag_changes_nothing() {
    let mut fx = fixture(|p| vec![task(p, "A", Column::NotStarted, 100.0)]);
    let a = id_of(&fx, "A");

    fx.board.handle(BoardEvent::DragStart { task_id: a });
    assert!(fx.board.session().dragging().is_some());
    assert!(fx.board.handle(BoardEvent::DragCancel).is_none());

    assert!(fx.board.session().dragging().is_none());
    assert_eq!(fx.store.commit_count(), 0);
}

// =============================================================================
// Feed interplay
// =============================================================================

#[tokio::test]
async fn feed_snapshot_after_write_matches_optimistic_state() {
    let mut fx = fixture(|p| {
        vec![
            task(p, "A", Column::NotStarted, 100.0),
            task(p, "B", Column::NotStarted, 200.0),
            task(p, "C", Column::InProgress, 100.0),
        ]
    });
    let c = id_of(&fx, "C");
    let a = id_of(&fx, "A");
    let mut feed = fx.store.subscribe_tasks(&fx.project_id).await.unwrap();

    assert!(drag(&mut fx, &c, Some(DropTarget::Task(a))).await);
    let optimistic = fx.board.session().tasks().to_vec();

    // Initial snapshot, then the one produced by the commit.
    feed.next().await.unwrap();
    let after = feed.next().await.unwrap();
    fx.board.handle(BoardEvent::Snapshot(after));

    assert_eq!(fx.board.session().tasks(), optimistic.as_slice());
    assert!(fx.board.session().is_synced());
}

#[tokio::test]
async fn other_projects_snapshots_are_ignored() {
    let mut fx = fixture(|p| vec![task(p, "A", Column::NotStarted, 100.0)]);
    let before = fx.board.session().tasks().to_vec();
    let stranger = ProjectId::new();

    fx.board
        .handle(BoardEvent::Snapshot(FeedSnapshot::Tasks {
            project_id: stranger.clone(),
            tasks: vec![task(&stranger, "Z", Column::Done, 100.0)],
        }));

    assert_eq!(fx.board.session().tasks(), before.as_slice());
}
