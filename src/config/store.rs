//! The owning configuration object.
//!
//! `ConfigStore` holds the link registry and player store for the process
//! lifetime and is the only place that talks to the persistence layer.
//! Every mutation of the registry or player store goes through here so the
//! file on disk always reflects the live state.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::common::error::ConfigError;
use crate::config::parser::{load_or_default, save_config};
use crate::config::players::{PlayerConfig, PlayerStore};
use crate::config::types::Config;
use crate::relay::registry::{ChannelLink, LinkEdit, LinkRegistry};

#[derive(Debug, Clone)]
struct GeneralSettings {
    bot_token: String,
    debug: bool,
}

/// Owner of all operator-editable state.
pub struct ConfigStore {
    path: PathBuf,
    links: Arc<LinkRegistry>,
    players: Arc<PlayerStore>,
    general: RwLock<GeneralSettings>,
}

impl ConfigStore {
    /// Load from disk, creating a default file when none exists.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = load_or_default(&path)?;
        Ok(Self::from_config(path, config))
    }

    /// Build a store from an already-parsed configuration.
    pub fn from_config(path: PathBuf, config: Config) -> Self {
        Self {
            path,
            links: Arc::new(LinkRegistry::new(config.channel_links)),
            players: Arc::new(PlayerStore::new(config.players)),
            general: RwLock::new(GeneralSettings {
                bot_token: config.bot_token,
                debug: config.debug,
            }),
        }
    }

    /// The link registry. Callers hold a reference, never a copy, so
    /// configuration edits are visible immediately.
    pub fn links(&self) -> Arc<LinkRegistry> {
        Arc::clone(&self.links)
    }

    /// The player store.
    #[allow(dead_code)]
    pub fn players(&self) -> Arc<PlayerStore> {
        Arc::clone(&self.players)
    }

    pub async fn bot_token(&self) -> String {
        self.general.read().await.bot_token.clone()
    }

    pub async fn debug(&self) -> bool {
        self.general.read().await.debug
    }

    /// Replace the stored credential and persist.
    #[allow(dead_code)]
    pub async fn set_bot_token(&self, token: &str) -> bool {
        self.general.write().await.bot_token = token.to_string();
        self.save().await
    }

    /// Apply a link edit and persist. Returns the new snapshot and whether
    /// persistence succeeded.
    pub async fn apply_link_edit(&self, edit: LinkEdit) -> (Vec<ChannelLink>, bool) {
        let snapshot = self.links.apply(edit).await;
        let persisted = self.save().await;
        (snapshot, persisted)
    }

    /// Look up a player entry, creating (and persisting) it on first access.
    pub async fn get_or_create_player(&self, identity: &str) -> PlayerConfig {
        let (config, created) = self.players.get_or_create(identity).await;
        if created {
            self.save().await;
        }
        config
    }

    /// Set a player's default channel and persist.
    #[allow(dead_code)]
    pub async fn set_default_channel(&self, identity: &str, guild: &str, channel: &str) {
        self.players.set_default_channel(identity, guild, channel).await;
        self.save().await;
    }

    /// Compose the current in-memory state into a `Config`.
    pub async fn current(&self) -> Config {
        let general = self.general.read().await.clone();
        Config {
            bot_token: general.bot_token,
            channel_links: self.links.snapshot().await,
            players: self.players.snapshot().await,
            debug: general.debug,
        }
    }

    /// Persist the current state. Failures are logged, never propagated.
    pub async fn save(&self) -> bool {
        debug!("Saving configuration");
        let config = self.current().await;
        match save_config(&self.path, &config) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save configuration: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_store(name: &str, config: Config) -> ConfigStore {
        let mut path = std::env::temp_dir();
        path.push(format!("herald-store-{}-{}.json", name, std::process::id()));
        let _ = fs::remove_file(&path);
        ConfigStore::from_config(path, config)
    }

    #[tokio::test]
    async fn test_link_edit_persists() {
        let store = temp_store("link-edit", Config::default());

        let (snapshot, persisted) = store
            .apply_link_edit(LinkEdit::Add(ChannelLink::new("G", "general", "Global")))
            .await;
        assert!(persisted);
        assert_eq!(snapshot.len(), 1);

        let on_disk = crate::config::parser::load_config(&store.path).expect("load failed");
        assert_eq!(on_disk.channel_links, snapshot);

        let _ = fs::remove_file(&store.path);
    }

    #[tokio::test]
    async fn test_player_created_lazily_and_persisted() {
        let store = temp_store("player", Config::default());

        let config = store.get_or_create_player("Bob").await;
        assert_eq!(config.identity, "Bob");

        let on_disk = crate::config::parser::load_config(&store.path).expect("load failed");
        assert_eq!(on_disk.players.len(), 1);

        let _ = fs::remove_file(&store.path);
    }

    #[tokio::test]
    async fn test_registry_reference_sees_edits() {
        let store = temp_store("shared-ref", Config::default());
        let links = store.links();

        assert!(links.find_by_local_channel("Global").await.is_none());
        store
            .apply_link_edit(LinkEdit::Add(ChannelLink::new("G", "general", "Global")))
            .await;
        assert!(links.find_by_local_channel("Global").await.is_some());

        let _ = fs::remove_file(&store.path);
    }
}
