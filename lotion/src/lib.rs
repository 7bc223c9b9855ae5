//! Lotion: personal kanban board with drag-and-drop ordering and live sync.

pub mod app;
pub mod board;
pub mod config;
pub mod feed;
pub mod notify;
pub mod store;
pub mod ui;
