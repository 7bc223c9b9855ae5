//! Integration tests for the board against a real `lotion-store` server.
//!
//! Starts the server on an ephemeral port, connects [`RemoteStore`] clients
//! over WebSocket, and checks that reorders are persisted atomically and
//! pushed to every subscriber.
//!
//! Verification command: `cargo test --test remote_store`

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use lotion::board::{Board, BoardEvent, DropTarget, OrderKeys};
use lotion::notify::Notifier;
use lotion::store::remote::{RemoteOptions, RemoteStore};
use lotion::store::{LiveFeed, StoreError, TaskStore};
use lotion_proto::batch::{TaskPatch, WriteBatch, WriteOp};
use lotion_proto::board::{Column, Project, ProjectId, Task, TaskId};
use lotion_proto::store::{FeedKey, FeedSnapshot};
use lotion_store::documents::DocumentStore;

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Test helpers
// =============================================================================

async fn start() -> (String, Arc<DocumentStore>, tokio::task::JoinHandle<()>) {
    let documents = Arc::new(DocumentStore::new());
    let (addr, handle) = lotion_store::server::start_server("127.0.0.1:0", Arc::clone(&documents))
        .await
        .expect("failed to start store server");
    (format!("ws://{addr}/ws"), documents, handle)
}

async fn client(url: &str) -> Arc<RemoteStore> {
    Arc::new(
        RemoteStore::connect(url, RemoteOptions::default())
            .await
            .expect("connect to store"),
    )
}

/// Seeds one project with tasks A, B, C in Not Started.
async fn seed(store: &RemoteStore) -> (ProjectId, Vec<TaskId>) {
    let project = Project {
        id: ProjectId::new(),
        name: "Shared".to_string(),
        order: 100.0,
        created_at: 0,
    };
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::PutProject(project.clone()));
    let mut ids = Vec::new();
    for (i, title) in ["A", "B", "C"].iter().enumerate() {
        let task = Task {
            id: TaskId::new(),
            project_id: project.id.clone(),
            title: (*title).to_string(),
            column: Column::NotStarted,
            order: (i as f64 + 1.0) * 100.0,
            image_url: None,
        };
        ids.push(task.id.clone());
        batch.push(WriteOp::PutTask(task));
    }
    store.commit(batch).await.expect("seed commit");
    (project.id, ids)
}

async fn next_tasks(feed: &mut LiveFeed) -> Vec<Task> {
    match tokio::time::timeout(WAIT, feed.next()).await.unwrap() {
        Some(FeedSnapshot::Tasks { tasks, .. }) => tasks,
        other => panic!("expected a task snapshot, got {other:?}"),
    }
}

fn titles_and_orders(tasks: &[Task]) -> Vec<(String, f64)> {
    tasks.iter().map(|t| (t.title.clone(), t.order)).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn reorder_is_persisted_and_pushed_back() {
    let (url, documents, _server) = start().await;
    let store = client(&url).await;
    let (project_id, ids) = seed(&store).await;

    let mut feed = store.subscribe_tasks(&project_id).await.unwrap();
    let initial = next_tasks(&mut feed).await;
    assert_eq!(initial.len(), 3);

    let (notifier, _rx) = Notifier::new(4);
    let mut board = Board::new(
        Arc::clone(&store),
        project_id.clone(),
        OrderKeys::default(),
        notifier,
    );
    board.handle(BoardEvent::Snapshot(FeedSnapshot::Tasks {
        project_id: project_id.clone(),
        tasks: initial,
    }));

    let write = board
        .handle(BoardEvent::DragEnd {
            active: ids[1].clone(),
            over: Some(DropTarget::Task(ids[0].clone())),
        })
        .unwrap();
    tokio::time::timeout(WAIT, write)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let expected = vec![
        ("B".to_string(), 100.0),
        ("A".to_string(), 200.0),
        ("C".to_string(), 300.0),
    ];
    let pushed = next_tasks(&mut feed).await;
    assert_eq!(titles_and_orders(&pushed), expected);

    let FeedSnapshot::Tasks { tasks, .. } = documents.snapshot(&FeedKey::Tasks(project_id)).await
    else {
        panic!("expected a task snapshot");
    };
    assert_eq!(titles_and_orders(&tasks), expected);
}

#[tokio::test]
async fn second_client_sees_the_move() {
    let (url, _documents, _server) = start().await;
    let writer = client(&url).await;
    let watcher = client(&url).await;
    let (project_id, ids) = seed(&writer).await;

    let mut feed = watcher.subscribe_tasks(&project_id).await.unwrap();
    next_tasks(&mut feed).await;

    let mut batch = WriteBatch::new();
    batch.update_task(
        ids[2].clone(),
        TaskPatch {
            column: Some(Column::Done),
            order: Some(100.0),
            ..TaskPatch::default()
        },
    );
    writer.commit(batch).await.unwrap();

    let tasks = next_tasks(&mut feed).await;
    let moved = tasks.iter().find(|t| t.id == ids[2]).unwrap();
    assert_eq!(moved.column, Column::Done);
    assert_eq!(moved.order, 100.0);
}

#[tokio::test]
async fn batch_touching_a_missing_task_is_rejected_whole() {
    let (url, documents, _server) = start().await;
    let store = client(&url).await;
    let (project_id, ids) = seed(&store).await;

    let mut batch = WriteBatch::new();
    batch.update_task(
        ids[0].clone(),
        TaskPatch {
            order: Some(999.0),
            ..TaskPatch::default()
        },
    );
    batch.update_task(
        TaskId::new(),
        TaskPatch {
            order: Some(1.0),
            ..TaskPatch::default()
        },
    );

    let err = store.commit(batch).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)), "got {err:?}");

    let FeedSnapshot::Tasks { tasks, .. } = documents.snapshot(&FeedKey::Tasks(project_id)).await
    else {
        panic!("expected a task snapshot");
    };
    let first = tasks.iter().find(|t| t.id == ids[0]).unwrap();
    assert_eq!(first.order, 100.0);
}

#[tokio::test]
async fn project_list_feed_follows_new_projects() {
    let (url, _documents, _server) = start().await;
    let store = client(&url).await;

    let mut feed = store.subscribe_projects().await.unwrap();
    let first = tokio::time::timeout(WAIT, feed.next()).await.unwrap();
    assert_eq!(
        first,
        Some(FeedSnapshot::Projects {
            projects: Vec::new()
        })
    );

    let (project_id, _) = seed(&store).await;
    let Some(FeedSnapshot::Projects { projects }) =
        tokio::time::timeout(WAIT, feed.next()).await.unwrap()
    else {
        panic!("expected a project snapshot");
    };
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, project_id);
}

#[tokio::test]
async fn unsubscribed_project_stops_receiving_snapshots() {
    let (url, _documents, _server) = start().await;
    let store = client(&url).await;
    let (project_id, ids) = seed(&store).await;

    let mut feed = store.subscribe_tasks(&project_id).await.unwrap();
    next_tasks(&mut feed).await;
    store
        .unsubscribe(FeedKey::Tasks(project_id.clone()))
        .await
        .unwrap();

    let mut batch = WriteBatch::new();
    batch.update_task(
        ids[0].clone(),
        TaskPatch {
            title: Some("renamed".to_string()),
            ..TaskPatch::default()
        },
    );
    store.commit(batch).await.unwrap();

    let quiet = tokio::time::timeout(Duration::from_millis(300), feed.next()).await;
    assert!(quiet.is_err(), "no snapshot expected after unsubscribe");
}
