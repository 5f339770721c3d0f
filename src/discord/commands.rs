//! Operator-facing message commands.
//!
//! These helpers back the host's bot/chat commands for sending arbitrary
//! messages into Discord. They sit outside the relay path but share the
//! connection manager and the player preference store.

use std::fmt;

use serenity::model::id::{ChannelId, GuildId};

use crate::config::store::ConfigStore;
use crate::discord::client::ConnectionManager;
use crate::discord::resolver::MentionResolver;

/// Outcome of a send-message command, rendered for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    NoClient,
    NoGuild,
    NoChannel,
    SendFailed,
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SendOutcome::Sent => "Message sent successfully!",
            SendOutcome::NoClient => "No discord client",
            SendOutcome::NoGuild => "No guild of that name found",
            SendOutcome::NoChannel => "No channel of that name or ID found in that guild",
            SendOutcome::SendFailed => "Failed to send message",
        };
        f.write_str(text)
    }
}

/// Parse a reference as a snowflake id. Only all-digit strings qualify;
/// anything else is treated as a name.
pub fn parse_snowflake(reference: &str) -> Option<u64> {
    if reference.is_empty() || !reference.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    reference.parse().ok().filter(|&id| id != 0)
}

/// Send a message to a channel addressed by name or id.
#[allow(dead_code)]
pub async fn send_message(
    manager: &ConnectionManager,
    message: &str,
    channel_ref: &str,
    guild_ref: &str,
) -> SendOutcome {
    manager.send_to_channel(guild_ref, channel_ref, message).await
}

/// Send a message on behalf of a local user, formatted as the relay
/// formats outbound chat.
#[allow(dead_code)]
pub async fn send_message_as_user(
    manager: &ConnectionManager,
    resolver: &MentionResolver,
    message: &str,
    username: &str,
    channel_ref: &str,
    guild_ref: &str,
) -> SendOutcome {
    manager
        .send_to_channel(
            guild_ref,
            channel_ref,
            &resolver.format_from_user(message, username),
        )
        .await
}

/// Send a message to the sender's configured default channel.
#[allow(dead_code)]
pub async fn send_to_default_channel(
    manager: &ConnectionManager,
    store: &ConfigStore,
    identity: &str,
    message: &str,
) -> SendOutcome {
    let player = store.get_or_create_player(identity).await;
    if player.default_channel.guild.is_empty() || player.default_channel.channel.is_empty() {
        return SendOutcome::NoChannel;
    }
    manager
        .send_to_channel(
            &player.default_channel.guild,
            &player.default_channel.channel,
            message,
        )
        .await
}

/// Resolve a player's default channel against the live guild data.
///
/// Returns `None` when the preference is unset or when either the guild or
/// the channel lookup fails.
#[allow(dead_code)]
pub async fn resolve_default_channel(
    manager: &ConnectionManager,
    store: &ConfigStore,
    identity: &str,
) -> Option<(GuildId, ChannelId)> {
    let player = store.get_or_create_player(identity).await;
    if player.default_channel.guild.is_empty() || player.default_channel.channel.is_empty() {
        return None;
    }
    manager
        .resolve_channel(&player.default_channel.guild, &player.default_channel.channel)
        .await
}
