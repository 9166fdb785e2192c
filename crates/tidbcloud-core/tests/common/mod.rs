//! Shared helpers for integration tests against a mock control plane

#![allow(dead_code)]

use tidbcloud_core::{Backend, ClientRegistry};
use wiremock::MockServer;

pub const PUBLIC_KEY: &str = "test-public";
pub const PRIVATE_KEY: &str = "test-private";
pub const USER_AGENT: &str = "tidbcloud-core-tests/1.0";

/// Route test logs through the libtest writer; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Registry with every backend family pointed at the mock server
pub fn registry(server: &MockServer) -> ClientRegistry {
    init_tracing();
    let mut builder = ClientRegistry::builder()
        .public_key(PUBLIC_KEY)
        .private_key(PRIVATE_KEY)
        .user_agent(USER_AGENT);
    for backend in Backend::ALL {
        builder = builder.endpoint(backend, server.uri());
    }
    builder.build().expect("mock endpoints are valid")
}
