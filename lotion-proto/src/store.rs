//! Wire protocol between Lotion clients and the document store server.
//!
//! Defines the [`StoreMessage`] enum that is postcard-encoded and sent over
//! WebSocket binary frames. Clients subscribe to live feeds and submit write
//! batches; the server answers commits by request id and pushes full
//! snapshots whenever a subscribed feed changes.

use serde::{Deserialize, Serialize};

use crate::batch::WriteBatch;
use crate::board::{Project, ProjectId, Task};

/// Error type for store protocol encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Correlates a commit with its acknowledgment.
pub type RequestId = u64;

/// Identifies one live feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedKey {
    /// The task list of one project.
    Tasks(ProjectId),
    /// The project list.
    Projects,
}

/// A full authoritative snapshot delivered by a live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedSnapshot {
    /// Every task of one project, sorted by order key.
    Tasks {
        /// Project the snapshot belongs to.
        project_id: ProjectId,
        /// Order-sorted tasks.
        tasks: Vec<Task>,
    },
    /// The complete project list, sorted by order key.
    Projects {
        /// Order-sorted projects.
        projects: Vec<Project>,
    },
}

impl FeedSnapshot {
    /// Returns the project a task snapshot belongs to, if any.
    #[must_use]
    pub const fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::Tasks { project_id, .. } => Some(project_id),
            Self::Projects { .. } => None,
        }
    }

    /// Returns the feed this snapshot belongs to.
    #[must_use]
    pub fn key(&self) -> FeedKey {
        match self {
            Self::Tasks { project_id, .. } => FeedKey::Tasks(project_id.clone()),
            Self::Projects { .. } => FeedKey::Projects,
        }
    }
}

/// Messages exchanged between store clients and the store server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreMessage {
    /// Client starts following the task list of a project.
    ///
    /// The server replies with an immediate [`StoreMessage::TaskSnapshot`].
    Subscribe {
        /// Project to follow.
        project_id: ProjectId,
    },

    /// Client stops following a project.
    Unsubscribe {
        /// Project to stop following.
        project_id: ProjectId,
    },

    /// Client starts following the project list.
    ///
    /// The server replies with an immediate [`StoreMessage::ProjectSnapshot`].
    SubscribeProjects,

    /// Client submits a batch to be committed atomically.
    Commit {
        /// Echoed back in the acknowledgment.
        request_id: RequestId,
        /// Writes to commit.
        batch: WriteBatch,
    },

    /// Server confirms that a batch was committed in full.
    Committed {
        /// Request being acknowledged.
        request_id: RequestId,
    },

    /// Server refused a batch; nothing from it was committed.
    Rejected {
        /// Request being refused.
        request_id: RequestId,
        /// Human-readable reason.
        reason: String,
    },

    /// Server pushes the full, ordered task list of one project.
    TaskSnapshot {
        /// Project the tasks belong to.
        project_id: ProjectId,
        /// Every task of the project, sorted by order.
        tasks: Vec<Task>,
    },

    /// Server pushes the full, ordered project list.
    ProjectSnapshot {
        /// Every project, sorted by order.
        projects: Vec<Project>,
    },

    /// Server reports a protocol-level error.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

impl From<FeedSnapshot> for StoreMessage {
    fn from(snapshot: FeedSnapshot) -> Self {
        match snapshot {
            FeedSnapshot::Tasks { project_id, tasks } => Self::TaskSnapshot { project_id, tasks },
            FeedSnapshot::Projects { projects } => Self::ProjectSnapshot { projects },
        }
    }
}

impl StoreMessage {
    /// The feed snapshot this message carries, if it is a snapshot push.
    #[must_use]
    pub fn into_snapshot(self) -> Option<FeedSnapshot> {
        match self {
            Self::TaskSnapshot { project_id, tasks } => {
                Some(FeedSnapshot::Tasks { project_id, tasks })
            }
            Self::ProjectSnapshot { projects } => Some(FeedSnapshot::Projects { projects }),
            _ => None,
        }
    }
}

/// Encodes a [`StoreMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the message cannot be serialized.
pub fn encode(msg: &StoreMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`StoreMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode(bytes: &[u8]) -> Result<StoreMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
