//! Lotion document store server library.
//!
//! Exposes the store server for use in tests and embedding. The server
//! accepts WebSocket connections, commits write batches atomically, and
//! pushes live-feed snapshots to subscribed clients.

pub mod config;
pub mod documents;
pub mod server;
