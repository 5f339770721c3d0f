//! Canonical message types for relay communication.
//!
//! These are the single source of truth for messages crossing the boundary
//! between the local chat bus and the Discord side. The Discord event
//! handler extracts everything the relay needs into `RemoteMessageEvent`
//! at the transport boundary, so nothing downstream touches serenity types.

use crate::common::types::MessageCategory;

/// A message posted into the local chat system.
#[derive(Debug, Clone)]
pub struct LocalChatMessage {
    /// Message body, possibly carrying local rich-text markup.
    pub text: String,
    /// Display name of the sending identity. Empty for system notices.
    pub sender: String,
    /// Channel tag, including its `#` marker (e.g. `#Global`).
    pub tag: String,
    /// Message category.
    pub category: MessageCategory,
    /// Whether the message is transient (not persisted by the host).
    pub temporary: bool,
}

/// Mention identifiers delivered with a Discord message, with the display
/// names that were resolvable at delivery time.
///
/// Resolution happens per message against the guild's current membership;
/// an id that could not be resolved is simply absent and its raw token is
/// left untouched in the body.
#[derive(Debug, Clone, Default)]
pub struct MentionSet {
    /// Mentioned users as (id, guild display name).
    pub users: Vec<(u64, String)>,
    /// Mentioned roles as (id, role name).
    pub roles: Vec<(u64, String)>,
    /// Mentioned channels as (id, channel name).
    pub channels: Vec<(u64, String)>,
}

/// A message-created event received from Discord, reduced to plain data.
#[derive(Debug, Clone)]
pub struct RemoteMessageEvent {
    /// Author's user id.
    pub author_id: u64,
    /// Author's base username.
    pub author_name: String,
    /// Author's guild display name, when the membership lookup succeeded.
    pub author_display: Option<String>,
    /// Whether the author is this client's own user.
    pub author_is_self: bool,
    /// Guild the message was posted in.
    pub guild_id: u64,
    /// Channel the message was posted in.
    pub channel_id: u64,
    /// Channel name.
    pub channel_name: String,
    /// Raw message body.
    pub content: String,
    /// Mentions delivered with the message.
    pub mentions: MentionSet,
}
