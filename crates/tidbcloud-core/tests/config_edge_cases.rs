use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;
use tidbcloud_core::config::{
    Backend, ClientConfig, ConfigError, DEFAULT_SERVERLESS_ENDPOINT, DEFAULT_USER_AGENT,
};

/// Returns true if running as root (euid == 0). Used to skip permission tests.
#[cfg(unix)]
fn is_root() -> bool {
    std::process::Command::new("id")
        .arg("-u")
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim() == "0")
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// 1. Nonexistent path
// ---------------------------------------------------------------------------

#[test]
fn load_from_nonexistent_path_returns_load_error() {
    let path = PathBuf::from("/tmp/tidbcloud-test-nonexistent/does/not/exist/config.toml");
    assert!(!path.exists());

    let err = ClientConfig::load_from_path(&path).unwrap_err();
    assert!(
        matches!(err, ConfigError::LoadError { .. }),
        "expected LoadError, got {err:?}"
    );
    assert!(err.to_string().contains("config.toml"));
}

// ---------------------------------------------------------------------------
// 2. Empty file and missing keys
// ---------------------------------------------------------------------------

#[test]
fn load_empty_config_file_requires_key_pair() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "").unwrap();

    let err = ClientConfig::load_from_path(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)), "got {err:?}");
}

#[test]
fn load_config_missing_private_key_returns_error() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "public_key = \"pub\"\n").unwrap();

    let err = ClientConfig::load_from_path(&config_path).unwrap_err();
    assert!(
        err.to_string().contains("private_key"),
        "error should name the missing field: {err}"
    );
}

#[test]
fn load_minimal_config_applies_defaults() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        "public_key = \"pub\"\nprivate_key = \"priv\"\n",
    )
    .unwrap();

    let config = ClientConfig::load_from_path(&config_path).unwrap();

    assert_eq!(config.public_key, "pub");
    assert_eq!(config.private_key, "priv");
    assert_eq!(config.user_agent(), DEFAULT_USER_AGENT);
    assert_eq!(config.endpoint(Backend::Serverless), DEFAULT_SERVERLESS_ENDPOINT);
    assert_eq!(config.timeouts.connect_timeout(), Duration::from_secs(30));
    assert!(config.timeouts.request_timeout().is_none());
}

// ---------------------------------------------------------------------------
// 3. Corrupt TOML
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_toml_returns_parse_error() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[[[broken").unwrap();

    let err = ClientConfig::load_from_path(&config_path).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("parse"), "error should mention parsing: {msg}");
}

// ---------------------------------------------------------------------------
// 4. Unknown fields
// ---------------------------------------------------------------------------

#[test]
fn load_config_with_unknown_fields_ignores_them() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");

    let content = r#"
public_key = "pub"
private_key = "priv"
unknown_top_level_key = "hello"

[endpoints]
dedicated = "https://dedicated.example.com"
totally_unknown_backend = "https://nowhere.example.com"
"#;
    fs::write(&config_path, content).unwrap();

    let config = ClientConfig::load_from_path(&config_path)
        .expect("unknown fields should be silently ignored");

    assert_eq!(
        config.endpoint(Backend::Dedicated),
        "https://dedicated.example.com"
    );
}

// ---------------------------------------------------------------------------
// 5. Round trip
// ---------------------------------------------------------------------------

#[test]
fn save_then_load_preserves_overrides() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("nested").join("config.toml");

    let config = ClientConfig::new("pub", "priv")
        .with_endpoint(Backend::Legacy, "http://127.0.0.1:8080")
        .with_user_agent("terraform-provider-tidbcloud/0.4.0")
        .with_request_timeout(Duration::from_secs(90));
    config.save_to_path(&config_path).unwrap();

    let loaded = ClientConfig::load_from_path(&config_path).unwrap();
    assert_eq!(loaded.endpoint(Backend::Legacy), "http://127.0.0.1:8080");
    assert_eq!(loaded.user_agent(), "terraform-provider-tidbcloud/0.4.0");
    assert_eq!(
        loaded.timeouts.request_timeout(),
        Some(Duration::from_secs(90))
    );
    assert_eq!(loaded.endpoints, config.endpoints);
}

#[test]
fn debug_output_redacts_private_key() {
    let config = ClientConfig::new("pub", "super-secret");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("<REDACTED>"));
}

// ---------------------------------------------------------------------------
// 6. Environment expansion
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn load_expands_environment_variables() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");

    let content = r#"
public_key = "${TIDBCLOUD_TEST_PUBLIC_KEY}"
private_key = "${TIDBCLOUD_TEST_PRIVATE_KEY}"

[endpoints]
serverless = "${TIDBCLOUD_TEST_UNSET_ENDPOINT:-https://serverless.example.com}"
"#;
    fs::write(&config_path, content).unwrap();

    unsafe {
        std::env::set_var("TIDBCLOUD_TEST_PUBLIC_KEY", "env-pub");
        std::env::set_var("TIDBCLOUD_TEST_PRIVATE_KEY", "env-priv");
        std::env::remove_var("TIDBCLOUD_TEST_UNSET_ENDPOINT");
    }

    let config = ClientConfig::load_from_path(&config_path).unwrap();

    unsafe {
        std::env::remove_var("TIDBCLOUD_TEST_PUBLIC_KEY");
        std::env::remove_var("TIDBCLOUD_TEST_PRIVATE_KEY");
    }

    assert_eq!(config.public_key, "env-pub");
    assert_eq!(config.private_key, "env-priv");
    assert_eq!(
        config.endpoint(Backend::Serverless),
        "https://serverless.example.com"
    );
}

// ---------------------------------------------------------------------------
// 7. Endpoint validation
// ---------------------------------------------------------------------------

#[test]
fn relative_endpoint_is_rejected() {
    let config = ClientConfig::new("pub", "priv").with_endpoint(Backend::Iam, "not a url");

    let err = config.endpoint_url(Backend::Iam).unwrap_err();
    match err {
        ConfigError::InvalidEndpoint { backend, url, .. } => {
            assert_eq!(backend, Backend::Iam);
            assert_eq!(url, "not a url");
        }
        other => panic!("expected InvalidEndpoint, got {other:?}"),
    }
}

#[test]
fn non_http_scheme_is_rejected() {
    let config =
        ClientConfig::new("pub", "priv").with_endpoint(Backend::Dedicated, "ftp://example.com");

    let err = config.endpoint_url(Backend::Dedicated).unwrap_err();
    assert!(err.to_string().contains("unsupported scheme"), "{err}");
}

#[test]
fn defaults_are_valid_endpoints() {
    let config = ClientConfig::new("pub", "priv");
    for backend in Backend::ALL {
        let url = config.endpoint_url(backend).unwrap();
        assert_eq!(url.scheme(), "https");
    }
}

// ---------------------------------------------------------------------------
// 8. Permission errors (unix only)
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn load_unreadable_file_returns_clear_error() {
    use std::os::unix::fs::PermissionsExt;

    if is_root() {
        eprintln!("skipping test: running as root");
        return;
    }

    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "public_key = \"a\"\nprivate_key = \"b\"\n").unwrap();
    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o000)).unwrap();

    let err = ClientConfig::load_from_path(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::LoadError { .. }), "got {err:?}");

    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o644)).unwrap();
}

#[cfg(unix)]
#[test]
fn save_to_readonly_directory_returns_clear_error() {
    use std::os::unix::fs::PermissionsExt;

    if is_root() {
        eprintln!("skipping test: running as root");
        return;
    }

    let dir = TempDir::new().unwrap();
    let readonly_dir = dir.path().join("readonly");
    fs::create_dir(&readonly_dir).unwrap();
    fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o444)).unwrap();

    let config_path = readonly_dir.join("config.toml");
    let err = ClientConfig::new("pub", "priv")
        .save_to_path(&config_path)
        .unwrap_err();
    assert!(matches!(err, ConfigError::SaveError { .. }), "got {err:?}");

    fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o755)).unwrap();
}
