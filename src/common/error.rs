//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    Parse { message: String },
}

/// Discord client lifecycle errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unable to create the discord client: {message}")]
    BuildFailed { message: String },

    #[error("Error connecting to discord: {message}")]
    ConnectFailed { message: String },
}

/// Result type alias for configuration operations.
#[allow(dead_code)]
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for client lifecycle operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
