//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::config::players::PlayerConfig;
use crate::relay::registry::ChannelLink;

/// Root configuration structure, persisted as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bot token for the Discord API.
    pub bot_token: String,
    /// Channels to connect together.
    pub channel_links: Vec<ChannelLink>,
    /// Per-player configuration entries.
    pub players: Vec<PlayerConfig>,
    /// Enables debug-level logging.
    pub debug: bool,
}
