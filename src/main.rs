//! Herald - Discord chat relay
//!
//! Bridges an embedded game server's chat channels with Discord channels
//! according to operator-configured channel links, relaying messages in
//! both directions.

mod common;
mod config;
mod discord;
mod local;
mod relay;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};

use config::env::get_config_path;
use config::store::ConfigStore;
use config::validate::validate_config;
use discord::client::ConnectionManager;
use local::bus::LocalChatBus;
use relay::engine::RelayEngine;
use relay::service::LinkService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the debug flag can raise the
    // default filter level.
    let config_path = get_config_path();
    let store = Arc::new(ConfigStore::load(&config_path)?);

    let default_level = if store.debug().await {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    info!("Herald v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from {}", config_path);

    for warning in validate_config(&store.current().await) {
        warn!("Config: {}", warning);
    }

    // ============================================================
    // Construct components and wire them explicitly
    // ============================================================

    let (bus, queue_rx) = LocalChatBus::new();
    let chat_worker = bus.spawn_worker(queue_rx);

    let manager = Arc::new(ConnectionManager::new(Arc::clone(&store)));
    let engine = Arc::new(RelayEngine::new(
        Arc::clone(&bus),
        Arc::clone(&manager),
        store.links(),
    ));
    let service = LinkService::new(Arc::clone(&store), Arc::clone(&manager), Arc::clone(&engine));

    // Surface status transitions in the log for the operator.
    let mut status_rx = manager.status();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            info!("Connection status: {}", status);
        }
    });

    // A failed first connect is not fatal: the operator fixes the
    // credential and saves, which restarts the client.
    if let Err(e) = service.connect().await {
        error!("Initial connection attempt failed: {e}");
    }

    shutdown_signal().await;
    info!("Shutting down...");

    service.disconnect().await;
    chat_worker.abort();

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
