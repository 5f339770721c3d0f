//! Per-player preference storage.
//!
//! One entry per local identity that has ever been looked up, created
//! lazily on first access. The core never deletes entries; pruning is an
//! operator concern.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A player's preferred Discord destination for outbound helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultChannel {
    /// Guild reference, name or snowflake id. Empty when unset.
    pub guild: String,
    /// Channel name within the guild. Empty when unset.
    pub channel: String,
}

/// Per-identity configuration entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Local chat identity this entry belongs to.
    pub identity: String,
    /// Preferred default destination.
    pub default_channel: DefaultChannel,
}

/// Store of player configuration entries.
#[derive(Debug, Default)]
pub struct PlayerStore {
    players: RwLock<Vec<PlayerConfig>>,
}

impl PlayerStore {
    pub fn new(players: Vec<PlayerConfig>) -> Self {
        Self {
            players: RwLock::new(players),
        }
    }

    /// Return the entry for an identity, creating an empty one on first
    /// access. The second element is true when the entry was just created
    /// (the caller persists in that case).
    pub async fn get_or_create(&self, identity: &str) -> (PlayerConfig, bool) {
        let mut players = self.players.write().await;
        if let Some(existing) = players.iter().find(|p| p.identity == identity) {
            return (existing.clone(), false);
        }

        let created = PlayerConfig {
            identity: identity.to_string(),
            ..Default::default()
        };
        players.push(created.clone());
        (created, true)
    }

    /// Set an identity's default channel, creating the entry if needed.
    pub async fn set_default_channel(&self, identity: &str, guild: &str, channel: &str) {
        let mut players = self.players.write().await;
        match players.iter_mut().find(|p| p.identity == identity) {
            Some(existing) => {
                existing.default_channel.guild = guild.to_string();
                existing.default_channel.channel = channel.to_string();
            }
            None => players.push(PlayerConfig {
                identity: identity.to_string(),
                default_channel: DefaultChannel {
                    guild: guild.to_string(),
                    channel: channel.to_string(),
                },
            }),
        }
    }

    /// Current entries.
    pub async fn snapshot(&self) -> Vec<PlayerConfig> {
        self.players.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_lazy() {
        let store = PlayerStore::default();
        assert!(store.snapshot().await.is_empty());

        let (config, created) = store.get_or_create("Bob").await;
        assert!(created);
        assert_eq!(config.identity, "Bob");
        assert!(config.default_channel.guild.is_empty());

        let (_, created_again) = store.get_or_create("Bob").await;
        assert!(!created_again);
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_exact_identity_match() {
        let store = PlayerStore::default();
        store.get_or_create("Bob").await;

        // Identity matching is exact, not case-folded.
        let (_, created) = store.get_or_create("bob").await;
        assert!(created);
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_set_default_channel() {
        let store = PlayerStore::default();

        store.set_default_channel("Bob", "G", "general").await;
        let (config, _) = store.get_or_create("Bob").await;
        assert_eq!(config.default_channel.guild, "G");
        assert_eq!(config.default_channel.channel, "general");

        store.set_default_channel("Bob", "Other", "trade").await;
        let (config, _) = store.get_or_create("Bob").await;
        assert_eq!(config.default_channel.guild, "Other");
        assert_eq!(store.snapshot().await.len(), 1);
    }
}
