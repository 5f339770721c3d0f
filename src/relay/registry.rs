//! The channel link registry.
//!
//! Holds the operator-configured mappings between Discord channels and
//! local chat channels and answers lookups in both directions. Lookups are
//! first-match in registration order; duplicates are allowed and simply
//! never win.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One operator-configured channel mapping.
///
/// `remote_guild` and `remote_channel` hold either a name or a numeric
/// snowflake id (all-digits means id) and are matched case-sensitively.
/// `local_channel` is a local chat channel name, matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelLink {
    pub remote_guild: String,
    pub remote_channel: String,
    pub local_channel: String,
}

impl ChannelLink {
    pub fn new(remote_guild: &str, remote_channel: &str, local_channel: &str) -> Self {
        Self {
            remote_guild: remote_guild.to_string(),
            remote_channel: remote_channel.to_string(),
            local_channel: local_channel.to_string(),
        }
    }
}

/// A mutation of the link set, applied as a single transaction.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum LinkEdit {
    Add(ChannelLink),
    RemoveAt(usize),
    ReplaceAll(Vec<ChannelLink>),
}

/// Registry over the configured channel links.
///
/// Read-mostly from the relay's perspective; mutation goes through
/// [`LinkRegistry::apply`] so readers always observe a complete snapshot.
#[derive(Debug, Default)]
pub struct LinkRegistry {
    links: RwLock<Vec<ChannelLink>>,
}

impl LinkRegistry {
    pub fn new(links: Vec<ChannelLink>) -> Self {
        Self {
            links: RwLock::new(links),
        }
    }

    /// Find the first link whose local channel name matches, ignoring case.
    pub async fn find_by_local_channel(&self, name: &str) -> Option<ChannelLink> {
        let wanted = name.to_lowercase();
        self.links
            .read()
            .await
            .iter()
            .find(|link| link.local_channel.to_lowercase() == wanted)
            .cloned()
    }

    /// Find the first link whose remote channel reference matches exactly.
    pub async fn find_by_remote_channel(&self, reference: &str) -> Option<ChannelLink> {
        self.links
            .read()
            .await
            .iter()
            .find(|link| link.remote_channel == reference)
            .cloned()
    }

    /// Current link set.
    pub async fn snapshot(&self) -> Vec<ChannelLink> {
        self.links.read().await.clone()
    }

    /// Apply an edit and return the new snapshot. Persistence is the
    /// caller's decision.
    pub async fn apply(&self, edit: LinkEdit) -> Vec<ChannelLink> {
        let mut links = self.links.write().await;
        match edit {
            LinkEdit::Add(link) => links.push(link),
            LinkEdit::RemoveAt(index) => {
                if index < links.len() {
                    links.remove(index);
                }
            }
            LinkEdit::ReplaceAll(replacement) => *links = replacement,
        }
        links.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_registry() -> LinkRegistry {
        LinkRegistry::new(vec![
            ChannelLink::new("G", "general", "Global"),
            ChannelLink::new("G", "trade-chat", "Trade"),
            ChannelLink::new("Other", "general", "Global"),
        ])
    }

    #[tokio::test]
    async fn test_local_lookup_case_insensitive() {
        let registry = make_registry();

        let link = registry.find_by_local_channel("global").await;
        assert_eq!(link, Some(ChannelLink::new("G", "general", "Global")));

        let link = registry.find_by_local_channel("GLOBAL").await;
        assert_eq!(link, Some(ChannelLink::new("G", "general", "Global")));
    }

    #[tokio::test]
    async fn test_local_lookup_first_match_wins() {
        let registry = make_registry();

        // Two links share the local name "Global"; registration order decides.
        let link = registry.find_by_local_channel("Global").await.unwrap();
        assert_eq!(link.remote_guild, "G");
    }

    #[tokio::test]
    async fn test_remote_lookup_case_sensitive() {
        let registry = make_registry();

        assert!(registry.find_by_remote_channel("general").await.is_some());
        assert!(registry.find_by_remote_channel("General").await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_miss_returns_none() {
        let registry = make_registry();

        assert!(registry.find_by_local_channel("Void").await.is_none());
        assert!(registry.find_by_remote_channel("void").await.is_none());
    }

    #[tokio::test]
    async fn test_remote_lookup_by_id_string() {
        let registry = LinkRegistry::new(vec![ChannelLink::new("G", "123456789", "Global")]);

        assert!(registry.find_by_remote_channel("123456789").await.is_some());
        assert!(registry.find_by_remote_channel("987654321").await.is_none());
    }

    #[tokio::test]
    async fn test_apply_returns_new_snapshot() {
        let registry = LinkRegistry::new(Vec::new());

        let snapshot = registry
            .apply(LinkEdit::Add(ChannelLink::new("G", "general", "Global")))
            .await;
        assert_eq!(snapshot.len(), 1);

        let snapshot = registry.apply(LinkEdit::RemoveAt(0)).await;
        assert!(snapshot.is_empty());

        // Out-of-range removal is a no-op.
        let snapshot = registry.apply(LinkEdit::RemoveAt(5)).await;
        assert!(snapshot.is_empty());

        let snapshot = registry
            .apply(LinkEdit::ReplaceAll(vec![
                ChannelLink::new("G", "a", "A"),
                ChannelLink::new("G", "b", "B"),
            ]))
            .await;
        assert_eq!(snapshot.len(), 2);
    }
}
