//! Mention and markup translation between Discord and local chat.
//!
//! Everything here is a pure substitution over data extracted from a
//! received message; nothing is cached across messages, so a rename is
//! reflected the next time a message is forwarded.

use fancy_regex::Regex;

use crate::common::messages::MentionSet;
use crate::local::markup;

/// Accent color for relayed author nametags (RRGGBBAA).
pub const NAMETAG_COLOR: &str = "7289DAFF";

/// Translates identity references and strips local markup.
#[derive(Debug, Clone)]
pub struct MentionResolver {
    /// Pattern matching any markup-like tag sequence.
    tag_strip_pattern: Regex,
}

impl Default for MentionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MentionResolver {
    pub fn new() -> Self {
        Self {
            tag_strip_pattern: Regex::new("<[^>]*>").unwrap(),
        }
    }

    /// Remove every `<...>` tag sequence from a message.
    ///
    /// Applied to outbound bodies so local markup (and anything trying to
    /// pass itself off as Discord mention syntax) never reaches Discord.
    pub fn strip_tags(&self, text: &str) -> String {
        self.tag_strip_pattern.replace_all(text, "").to_string()
    }

    /// Format an outbound message as `**sender**: body` with the body
    /// stripped of tag sequences.
    pub fn format_from_user(&self, message: &str, username: &str) -> String {
        format!("**{}**: {}", username, self.strip_tags(message))
    }

    /// Replace raw mention tokens with readable names.
    ///
    /// `<@id>` and `<@!id>` become `@display`, `<@&id>` becomes `@role`,
    /// `<#id>` becomes `#channel`. Tokens whose id is not present in the
    /// mention set are left untouched.
    pub fn rewrite_mentions(&self, content: &str, mentions: &MentionSet) -> String {
        let mut result = content.to_string();

        for (id, display) in &mentions.users {
            let name = format!("@{display}");
            result = result
                .replace(&format!("<@{id}>"), &name)
                .replace(&format!("<@!{id}>"), &name);
        }
        for (id, role) in &mentions.roles {
            result = result.replace(&format!("<@&{id}>"), &format!("@{role}"));
        }
        for (id, channel) in &mentions.channels {
            result = result.replace(&format!("<#{id}>"), &format!("#{channel}"));
        }

        result
    }

    /// Render the author nametag for a relayed message.
    ///
    /// A resolved guild display name is styled bold in the accent color;
    /// otherwise the plain username is used as-is.
    pub fn nametag(&self, display_name: Option<&str>, username: &str) -> String {
        match display_name {
            Some(display) => markup::bold(&markup::color(NAMETAG_COLOR, display)),
            None => username.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags() {
        let resolver = MentionResolver::new();

        assert_eq!(resolver.strip_tags("<b>hi</b> there"), "hi there");
        assert_eq!(resolver.strip_tags("no tags"), "no tags");
        assert_eq!(
            resolver.strip_tags("<color=#7289DAFF>styled</color>"),
            "styled"
        );
    }

    #[test]
    fn test_strip_tags_idempotent() {
        let resolver = MentionResolver::new();

        let once = resolver.strip_tags("<b>hi</b> there");
        assert_eq!(resolver.strip_tags(&once), once);
    }

    #[test]
    fn test_format_from_user() {
        let resolver = MentionResolver::new();

        assert_eq!(resolver.format_from_user("hi", "Bob"), "**Bob**: hi");
        assert_eq!(
            resolver.format_from_user("<b>hi</b> there", "Bob"),
            "**Bob**: hi there"
        );
    }

    #[test]
    fn test_rewrite_user_mentions() {
        let resolver = MentionResolver::new();
        let mentions = MentionSet {
            users: vec![(123, "Alice".to_string())],
            ..Default::default()
        };

        assert_eq!(
            resolver.rewrite_mentions("hello <@123>", &mentions),
            "hello @Alice"
        );
        assert_eq!(
            resolver.rewrite_mentions("hello <@!123>", &mentions),
            "hello @Alice"
        );
    }

    #[test]
    fn test_unresolved_mention_left_raw() {
        let resolver = MentionResolver::new();

        let rewritten = resolver.rewrite_mentions("hello <@123>", &MentionSet::default());
        assert_eq!(rewritten, "hello <@123>");
    }

    #[test]
    fn test_rewrite_role_and_channel_mentions() {
        let resolver = MentionResolver::new();
        let mentions = MentionSet {
            users: Vec::new(),
            roles: vec![(55, "Moderator".to_string())],
            channels: vec![(77, "general".to_string())],
        };

        assert_eq!(
            resolver.rewrite_mentions("ping <@&55> in <#77>", &mentions),
            "ping @Moderator in #general"
        );
    }

    #[test]
    fn test_nametag_styles_resolved_display() {
        let resolver = MentionResolver::new();

        assert_eq!(
            resolver.nametag(Some("Alice"), "alice_raw"),
            "<b><color=#7289DAFF>Alice</color></b>"
        );
        assert_eq!(resolver.nametag(None, "alice_raw"), "alice_raw");
    }
}
