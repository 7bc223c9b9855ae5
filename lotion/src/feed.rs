//! Live feed listeners.
//!
//! A listener follows one [`LiveFeed`] and forwards every snapshot as a
//! [`BoardEvent::Snapshot`] into the channel the board's event loop drains.
//! The loop applies them in arrival order, interleaved with local events.

use std::sync::Arc;

use lotion_proto::store::FeedKey;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::board::BoardEvent;
use crate::store::{LiveFeed, StoreError, TaskStore};

/// Spawns a task forwarding `feed` into `events`.
///
/// The task ends when the feed closes or the receiver is dropped.
pub fn spawn_listener(mut feed: LiveFeed, events: mpsc::Sender<BoardEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let key = feed.key().clone();
        while let Some(snapshot) = feed.next().await {
            if events.send(BoardEvent::Snapshot(snapshot)).await.is_err() {
                tracing::debug!(feed = ?key, "event loop gone, stopping feed listener");
                return;
            }
        }
        tracing::info!(feed = ?key, "live feed closed");
    })
}

/// Subscribes to `key` on `store` and spawns its listener.
///
/// # Errors
///
/// Returns the store's error if the subscription cannot be set up.
pub async fn follow<S: TaskStore>(
    store: &Arc<S>,
    key: FeedKey,
    events: mpsc::Sender<BoardEvent>,
) -> Result<JoinHandle<()>, StoreError> {
    let feed = store.subscribe(key).await?;
    Ok(spawn_listener(feed, events))
}
