//! Lotion document store server.
//!
//! An axum WebSocket server holding the authoritative board documents.
//! Clients commit atomic write batches and follow live feeds of their
//! projects' task lists.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100, memory only
//! cargo run --bin lotion-store
//!
//! # Persist documents to a file
//! cargo run --bin lotion-store -- --data-file ~/lotion.json
//!
//! # Or via environment variable
//! LOTION_STORE_ADDR=127.0.0.1:8080 cargo run --bin lotion-store
//! ```

use std::sync::Arc;

use clap::Parser;
use lotion_store::config::{StoreCliArgs, StoreConfig};
use lotion_store::documents::DocumentStore;
use lotion_store::server;

#[tokio::main]
async fn main() {
    let cli = StoreCliArgs::parse();

    let config = match StoreConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let documents = match &config.data_file {
        Some(path) => match DocumentStore::open(path, config.max_batch_ops, config.feed_buffer) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "failed to open data file");
                std::process::exit(1);
            }
        },
        None => DocumentStore::with_workspace(
            lotion_proto::batch::Workspace::new(),
            config.max_batch_ops,
            config.feed_buffer,
        ),
    };

    tracing::info!(addr = %config.bind_addr, "starting lotion store server");

    match server::start_server(&config.bind_addr, Arc::new(documents)).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "store server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "store server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start store server");
            std::process::exit(1);
        }
    }
}
