//! Configuration file reading and writing (JSON format).

use std::fs;
use std::path::Path;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Load configuration from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })
}

/// Write configuration to a JSON file.
pub fn save_config(path: impl AsRef<Path>, config: &Config) -> Result<(), ConfigError> {
    let path = path.as_ref();

    let raw = serde_json::to_string_pretty(config).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })?;

    fs::write(path, raw).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load configuration, creating and persisting a default file when none
/// exists yet.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    if path.exists() {
        load_config(path)
    } else {
        let config = Config::default();
        save_config(path, &config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::players::PlayerConfig;
    use crate::relay::registry::ChannelLink;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("herald-test-{}-{}.json", name, std::process::id()));
        path
    }

    #[test]
    fn test_round_trip() {
        let path = temp_path("round-trip");

        let config = Config {
            bot_token: "token".to_string(),
            channel_links: vec![ChannelLink::new("G", "general", "Global")],
            players: vec![PlayerConfig {
                identity: "Bob".to_string(),
                ..Default::default()
            }],
            debug: true,
        };

        save_config(&path, &config).expect("save failed");
        let loaded = load_config(&path).expect("load failed");

        assert_eq!(loaded.bot_token, "token");
        assert_eq!(loaded.channel_links, config.channel_links);
        assert_eq!(loaded.players, config.players);
        assert!(loaded.debug);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_or_default_creates_file() {
        let path = temp_path("load-or-default");
        let _ = fs::remove_file(&path);

        let config = load_or_default(&path).expect("load_or_default failed");
        assert!(config.bot_token.is_empty());
        assert!(path.exists());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_fields_default() {
        let path = temp_path("partial");
        fs::write(&path, r#"{"bot_token": "abc"}"#).expect("write failed");

        let config = load_config(&path).expect("load failed");
        assert_eq!(config.bot_token, "abc");
        assert!(config.channel_links.is_empty());
        assert!(!config.debug);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let path = temp_path("invalid");
        fs::write(&path, "{not json").expect("write failed");

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        let _ = fs::remove_file(&path);
    }
}
