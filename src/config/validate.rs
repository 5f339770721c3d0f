//! Configuration validation.
//!
//! Configuration problems are never fatal here (an empty token, for
//! instance, is substituted with a placeholder at connect time), so
//! validation produces warnings for the operator rather than errors.

use std::collections::HashSet;

use crate::config::types::Config;

/// Check a configuration for likely operator mistakes.
pub fn validate_config(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.bot_token.trim().is_empty() {
        warnings.push(
            "bot_token is empty; the connection attempt will fail authentication".to_string(),
        );
    }

    let mut seen_local: HashSet<String> = HashSet::new();
    let mut seen_remote: HashSet<(String, String)> = HashSet::new();
    for (i, link) in config.channel_links.iter().enumerate() {
        if link.remote_guild.trim().is_empty()
            || link.remote_channel.trim().is_empty()
            || link.local_channel.trim().is_empty()
        {
            warnings.push(format!(
                "channel_links[{i}] has an empty field; messages for it will be dropped"
            ));
        }

        if !seen_local.insert(link.local_channel.to_lowercase()) {
            warnings.push(format!(
                "channel_links[{i}] duplicates local channel '{}'; only the first entry will match",
                link.local_channel
            ));
        }
        if !seen_remote.insert((link.remote_guild.clone(), link.remote_channel.clone())) {
            warnings.push(format!(
                "channel_links[{i}] duplicates remote channel '{}'; only the first entry will match",
                link.remote_channel
            ));
        }
    }

    for (i, player) in config.players.iter().enumerate() {
        if player.identity.trim().is_empty() {
            warnings.push(format!("players[{i}] has an empty identity"));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::registry::ChannelLink;

    fn make_valid_config() -> Config {
        Config {
            bot_token: "valid_token_here".to_string(),
            channel_links: vec![ChannelLink::new("G", "general", "Global")],
            players: Vec::new(),
            debug: false,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&make_valid_config()).is_empty());
    }

    #[test]
    fn test_empty_token_warns() {
        let mut config = make_valid_config();
        config.bot_token = "   ".to_string();

        let warnings = validate_config(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("bot_token"));
    }

    #[test]
    fn test_duplicate_local_channel_warns() {
        let mut config = make_valid_config();
        config
            .channel_links
            .push(ChannelLink::new("Other", "elsewhere", "GLOBAL"));

        let warnings = validate_config(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("duplicates local channel"));
    }

    #[test]
    fn test_empty_link_field_warns() {
        let mut config = make_valid_config();
        config.channel_links.push(ChannelLink::new("G", "", "Trade"));

        let warnings = validate_config(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("empty field"));
    }
}
