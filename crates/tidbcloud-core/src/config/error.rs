//! Error types for configuration operations

use thiserror::Error;

use super::Backend;

/// Errors that can occur during configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config from {path}: {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save config to {path}: {source}")]
    SaveError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid {backend} endpoint '{url}': {reason}")]
    InvalidEndpoint {
        backend: Backend,
        url: String,
        reason: String,
    },

    #[error("Invalid timeout {field}: {reason}")]
    InvalidTimeout { field: &'static str, reason: String },

    #[error("Failed to initialize HTTP client: {0}")]
    HttpClient(String),

    #[error("Failed to determine config directory")]
    ConfigDirError,
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
