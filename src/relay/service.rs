//! Service-level orchestration of the relay.
//!
//! Owns the ordering rules the components themselves cannot enforce:
//! relay wiring goes up only after a successful connect, and comes down
//! before any transport disconnect or client disposal. Also drives the
//! credential-rotation path on configuration save.

use std::sync::Arc;

use tracing::{error, info};

use crate::common::error::ClientResult;
use crate::config::store::ConfigStore;
use crate::discord::client::ConnectionManager;
use crate::relay::engine::RelayEngine;
use crate::relay::registry::{ChannelLink, LinkEdit};

/// The assembled relay: configuration, connection, and engine.
pub struct LinkService {
    store: Arc<ConfigStore>,
    manager: Arc<ConnectionManager>,
    engine: Arc<RelayEngine>,
}

impl LinkService {
    pub fn new(
        store: Arc<ConfigStore>,
        manager: Arc<ConnectionManager>,
        engine: Arc<RelayEngine>,
    ) -> Self {
        Self {
            store,
            manager,
            engine,
        }
    }

    /// Connect and wire the relay. Wiring happens exactly once per
    /// successful connect; a failed connect leaves the relay unwired.
    pub async fn connect(&self) -> ClientResult<()> {
        self.manager.connect().await?;
        self.engine.begin_relaying().await;
        Ok(())
    }

    /// Unwire the relay, then disconnect the transport.
    pub async fn disconnect(&self) {
        self.engine.stop_relaying().await;
        self.manager.disconnect().await;
    }

    /// Tear everything down and bring it back up with the stored credential.
    pub async fn restart(&self) -> ClientResult<()> {
        self.engine.stop_relaying().await;
        self.manager.restart().await?;
        self.engine.begin_relaying().await;
        Ok(())
    }

    /// Persist the configuration, reinitializing the client when the stored
    /// credential no longer matches the one the live client was built with.
    pub async fn save_config(&self) -> bool {
        let persisted = self.store.save().await;

        let stored = self.store.bot_token().await;
        let built_with = self.manager.built_with_token().await;
        if credential_changed(built_with.as_deref(), &stored) {
            info!("Discord token changed, reinitialising client");
            if let Err(e) = self.restart().await {
                error!("Failed to restart discord client: {e}");
            }
        }

        persisted
    }

    /// Apply a channel-link edit through the configuration store.
    #[allow(dead_code)]
    pub async fn apply_link_edit(&self, edit: LinkEdit) -> (Vec<ChannelLink>, bool) {
        self.store.apply_link_edit(edit).await
    }
}

/// Whether a configuration save must reinitialize the client.
///
/// A client that was never built has nothing to reinitialize; the next
/// connect picks up the stored credential anyway.
fn credential_changed(built_with: Option<&str>, stored: &str) -> bool {
    match built_with {
        Some(built) => built != stored,
        None => false,
    }
}
