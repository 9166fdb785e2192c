//! Client configuration for the TiDB Cloud access layer
//!
// Allow nested config module - this is intentional for the config subsystem

#![allow(clippy::module_inception)]
//!
//! The configuration describes everything the [`ClientRegistry`](crate::ClientRegistry)
//! needs at construction time: the API key pair, per-backend endpoint overrides,
//! the identification string sent with every request and timeouts.
//!
//! # Features
//!
//! - TOML config files with platform-specific default location
//! - Environment variable expansion in config files
//! - Independent endpoint overrides for each backend family

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{
    Backend, ClientConfig, DEFAULT_DEDICATED_ENDPOINT, DEFAULT_IAM_ENDPOINT,
    DEFAULT_LEGACY_ENDPOINT, DEFAULT_SERVERLESS_ENDPOINT, DEFAULT_USER_AGENT, EndpointOverrides,
    TimeoutConfig,
};
pub use error::{ConfigError, Result};
