//! Configuration management for the TiDB Cloud access layer
//!
//! Handles configuration loading from TOML files and programmatic construction.
//! Environment variables are only consulted through `${VAR}` expansion of a
//! config file the caller chose to load.

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::error::{ConfigError, Result};

/// Default base endpoint of the legacy numeric-id REST API
pub const DEFAULT_LEGACY_ENDPOINT: &str = "https://api.tidbcloud.com";
/// Default base endpoint of the dedicated cluster API
pub const DEFAULT_DEDICATED_ENDPOINT: &str = "https://dedicated.tidbapi.com";
/// Default base endpoint of the identity and access management API
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.tidbapi.com";
/// Default base endpoint of the serverless cluster API
pub const DEFAULT_SERVERLESS_ENDPOINT: &str = "https://serverless.tidbapi.com";

/// Identification string sent when the caller does not provide one
pub const DEFAULT_USER_AGENT: &str = concat!("tidbcloud-core/", env!("CARGO_PKG_VERSION"));

/// The four independently versioned backend API families
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Legacy,
    Dedicated,
    Iam,
    Serverless,
}

impl Backend {
    /// All backend families, in registry order
    pub const ALL: [Backend; 4] = [
        Backend::Legacy,
        Backend::Dedicated,
        Backend::Iam,
        Backend::Serverless,
    ];

    /// Documented default base endpoint for this family
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Backend::Legacy => DEFAULT_LEGACY_ENDPOINT,
            Backend::Dedicated => DEFAULT_DEDICATED_ENDPOINT,
            Backend::Iam => DEFAULT_IAM_ENDPOINT,
            Backend::Serverless => DEFAULT_SERVERLESS_ENDPOINT,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Legacy => write!(f, "legacy"),
            Backend::Dedicated => write!(f, "dedicated"),
            Backend::Iam => write!(f, "iam"),
            Backend::Serverless => write!(f, "serverless"),
        }
    }
}

/// Main configuration structure
#[derive(Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Public half of the API key pair (digest username)
    pub public_key: String,
    /// Private half of the API key pair (digest password)
    pub private_key: String,
    /// Per-backend base endpoint overrides
    #[serde(default)]
    pub endpoints: EndpointOverrides,
    /// Identification string sent as `User-Agent` with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Connection and request timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Optional base endpoint per backend family
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct EndpointOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serverless: Option<String>,
}

impl EndpointOverrides {
    fn get(&self, backend: Backend) -> Option<&str> {
        match backend {
            Backend::Legacy => self.legacy.as_deref(),
            Backend::Dedicated => self.dedicated.as_deref(),
            Backend::Iam => self.iam.as_deref(),
            Backend::Serverless => self.serverless.as_deref(),
        }
    }

    fn slot(&mut self, backend: Backend) -> &mut Option<String> {
        match backend {
            Backend::Legacy => &mut self.legacy,
            Backend::Dedicated => &mut self.dedicated,
            Backend::Iam => &mut self.iam,
            Backend::Serverless => &mut self.serverless,
        }
    }
}

/// Timeout configuration
///
/// Stored in milliseconds so sub-second values survive a round trip
/// through the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutConfig {
    /// TCP/TLS connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Default per-call deadline in milliseconds, applied when the caller's
    /// context carries none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: None,
        }
    }
}

impl TimeoutConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Reject zero timeouts, which would fail every call
    pub fn validate(&self) -> Result<()> {
        check_timeout("connect_timeout_ms", self.connect_timeout())?;
        if let Some(timeout) = self.request_timeout() {
            check_timeout("request_timeout_ms", timeout)?;
        }
        Ok(())
    }
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

/// Fails with [`ConfigError::InvalidTimeout`] for a zero duration
pub(crate) fn check_timeout(field: &'static str, timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(ConfigError::InvalidTimeout {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Whole milliseconds, rounded up so a non-zero duration never becomes zero
fn millis_ceil(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &"<REDACTED>")
            .field("endpoints", &self.endpoints)
            .field("user_agent", &self.user_agent)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration with the given key pair and all defaults
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
            endpoints: EndpointOverrides::default(),
            user_agent: None,
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Override the base endpoint of one backend family
    #[must_use]
    pub fn with_endpoint(mut self, backend: Backend, url: impl Into<String>) -> Self {
        *self.endpoints.slot(backend) = Some(url.into());
        self
    }

    /// Set the identification string
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the TCP/TLS connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect_timeout_ms = millis_ceil(timeout);
        self
    }

    /// Set the default per-call deadline
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout_ms = Some(millis_ceil(timeout));
        self
    }

    /// Identification string, falling back to [`DEFAULT_USER_AGENT`]
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Configured endpoint for a family, falling back to its default
    pub fn endpoint(&self, backend: Backend) -> &str {
        self.endpoints
            .get(backend)
            .unwrap_or_else(|| backend.default_endpoint())
    }

    /// Parse and validate the endpoint for a family
    ///
    /// The endpoint must be an absolute `http` or `https` URL.
    pub fn endpoint_url(&self, backend: Backend) -> Result<Url> {
        let raw = self.endpoint(backend);
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            backend,
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(invalid("not an absolute URL".to_string()));
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        Ok(url)
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        // Expand environment variables in the config content
        let expanded_content = Self::expand_env_vars(&content);

        let config: ClientConfig = toml::from_str(&expanded_content)?;

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Get the path to the configuration file
    ///
    /// On macOS, `~/.config/tidbcloud/config.toml` wins when it exists,
    /// otherwise the platform directory is used:
    ///
    /// On Linux: ~/.config/tidbcloud/config.toml
    /// On Windows: %APPDATA%\pingcap\tidbcloud\config.toml
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_path = base_dirs
                    .home_dir()
                    .join(".config")
                    .join("tidbcloud")
                    .join("config.toml");

                if linux_style_path.exists() {
                    return Ok(linux_style_path);
                }
            }
        }

        let proj_dirs =
            ProjectDirs::from("com", "pingcap", "tidbcloud").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand environment variables in configuration content
    ///
    /// Supports ${VAR} and ${VAR:-default} syntax. Unset variables are left
    /// unexpanded.
    ///
    /// Example:
    /// ```toml
    /// public_key = "${TIDBCLOUD_PUBLIC_KEY}"
    /// [endpoints]
    /// serverless = "${TIDBCLOUD_SERVERLESS_ENDPOINT:-https://serverless.tidbapi.com}"
    /// ```
    fn expand_env_vars(content: &str) -> String {
        let expanded =
            shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok());
        expanded.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = ClientConfig::new("pub", "priv")
            .with_endpoint(Backend::Serverless, "https://serverless.example.com")
            .with_user_agent("terraform-provider-tidbcloud/0.4.0");

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: ClientConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(deserialized.public_key, "pub");
        assert_eq!(deserialized.private_key, "priv");
        assert_eq!(deserialized.endpoints, config.endpoints);
        assert_eq!(
            deserialized.user_agent(),
            "terraform-provider-tidbcloud/0.4.0"
        );
    }

    #[test]
    fn test_endpoint_defaults_and_overrides() {
        let config = ClientConfig::new("k", "s").with_endpoint(Backend::Iam, "http://localhost:8080");

        assert_eq!(config.endpoint(Backend::Legacy), DEFAULT_LEGACY_ENDPOINT);
        assert_eq!(config.endpoint(Backend::Dedicated), DEFAULT_DEDICATED_ENDPOINT);
        assert_eq!(config.endpoint(Backend::Iam), "http://localhost:8080");
        assert_eq!(config.endpoint(Backend::Serverless), DEFAULT_SERVERLESS_ENDPOINT);
    }

    #[test]
    fn test_endpoint_url_validation() {
        for bad in ["not a url", "/relative/path", "mailto:ops@example.com", "ftp://host"] {
            let config = ClientConfig::new("k", "s").with_endpoint(Backend::Dedicated, bad);
            let err = config.endpoint_url(Backend::Dedicated).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEndpoint { backend: Backend::Dedicated, .. }),
                "expected invalid endpoint for {bad}, got {err}"
            );
        }

        let config = ClientConfig::new("k", "s");
        for backend in Backend::ALL {
            assert!(config.endpoint_url(backend).is_ok());
        }
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = ClientConfig::new("public-abc", "very-secret");
        let debug = format!("{config:?}");
        assert!(debug.contains("public-abc"));
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_expansion() {
        unsafe {
            std::env::set_var("TEST_TIDB_PUBLIC_KEY", "expanded-public");
        }

        let content = r#"
public_key = "${TEST_TIDB_PUBLIC_KEY}"
private_key = "static-private"

[endpoints]
legacy = "${TEST_TIDB_MISSING:-https://api.example.com}"
"#;

        let expanded = ClientConfig::expand_env_vars(content);
        let config: ClientConfig = toml::from_str(&expanded).unwrap();
        assert_eq!(config.public_key, "expanded-public");
        assert_eq!(config.private_key, "static-private");
        assert_eq!(config.endpoint(Backend::Legacy), "https://api.example.com");

        unsafe {
            std::env::remove_var("TEST_TIDB_PUBLIC_KEY");
        }
    }

    #[test]
    fn test_backend_display_matches_serde() {
        for backend in Backend::ALL {
            let json = serde_json::to_string(&backend).unwrap();
            assert_eq!(json, format!("\"{backend}\""));
        }
    }

    #[test]
    fn test_sub_second_timeouts_keep_their_value() {
        let config = ClientConfig::new("k", "s")
            .with_connect_timeout(Duration::from_millis(250))
            .with_request_timeout(Duration::from_millis(500));

        assert_eq!(config.timeouts.connect_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.timeouts.request_timeout(),
            Some(Duration::from_millis(500))
        );
        assert!(config.timeouts.validate().is_ok());

        let rounded = ClientConfig::new("k", "s").with_request_timeout(Duration::from_micros(1));
        assert_eq!(
            rounded.timeouts.request_timeout(),
            Some(Duration::from_millis(1))
        );
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config: ClientConfig = toml::from_str(
            "public_key = \"k\"\nprivate_key = \"s\"\n[timeouts]\nrequest_timeout_ms = 0\n",
        )
        .unwrap();
        let err = config.timeouts.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidTimeout {
                field: "request_timeout_ms",
                ..
            }
        ));
    }
}
