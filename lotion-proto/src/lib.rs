//! Shared data model and wire protocol for Lotion.

pub mod batch;
pub mod board;
pub mod store;
