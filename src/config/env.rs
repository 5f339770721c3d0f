//! Environment-driven settings.

/// Environment variable naming the configuration file.
const CONFIG_PATH_VAR: &str = "HERALD_CONFIG";

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "herald.json";

/// Resolve the configuration file path.
pub fn get_config_path() -> String {
    std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
