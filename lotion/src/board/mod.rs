//! Board state and the drag-and-drop reorder engine.
//!
//! A drop runs through four stages, always in this order:
//! 1. [`planner::plan_reorder`] turns the gesture into a new column sequence.
//! 2. [`order::OrderKeys`] assigns fresh order keys to that sequence.
//! 3. [`optimistic::apply_plan`] merges the result into the local task list.
//! 4. [`sync::SyncWriter`] commits the change as one atomic batch.
//!
//! The live feed may overwrite the local list at any time and always wins.

pub mod context;
pub mod crud;
pub mod optimistic;
pub mod order;
pub mod planner;
pub mod session;
pub mod sync;

pub use context::Board;
pub use order::OrderKeys;
pub use planner::{DropTarget, ReorderPlan, plan_reorder};
pub use session::{BoardEvent, BoardSession};
pub use sync::SyncWriter;

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during board operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the configured maximum length.
    #[error("task title too long (max {max} characters)")]
    TitleTooLong {
        /// Configured maximum, in characters.
        max: usize,
    },
    /// Project name cannot be empty.
    #[error("project name cannot be empty")]
    NameEmpty,
    /// Task with the given ID is not on the board.
    #[error("task not found: {0}")]
    TaskNotFound(String),
    /// Project with the given ID is not known.
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    /// The store refused or failed the write.
    #[error(transparent)]
    Store(#[from] StoreError),
}
