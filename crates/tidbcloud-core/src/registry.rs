//! Client registry: one handle per backend family over one shared transport
//!
//! # Example
//!
//! ```rust,ignore
//! use tidbcloud_core::{Backend, CallContext, ClientRegistry, ServerlessApi};
//!
//! let registry = ClientRegistry::builder()
//!     .public_key(public_key)
//!     .private_key(private_key)
//!     .endpoint(Backend::Serverless, "https://serverless.tidbapi.com")
//!     .user_agent("terraform-provider-tidbcloud/0.4.0")
//!     .build()?;
//!
//! let serverless = registry.serverless()?;
//! let cluster = serverless.get_cluster(&CallContext::new(), "10086").await?;
//! ```

use bytes::Bytes;
use reqwest::{Method, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::config::check_timeout;
use crate::config::{Backend, ClientConfig};
use crate::context::CallContext;
use crate::dedicated::DedicatedClient;
use crate::dispatch::Dispatcher;
use crate::error::{CoreError, NormalizedError, Result};
use crate::iam::IamClient;
use crate::legacy::LegacyClient;
use crate::normalize::request_path;
use crate::serverless::ServerlessClient;
use crate::transport::{Credentials, SharedTransport, Transport, TransportSettings};
use crate::upload::Uploader;

/// A configured client for one backend family
///
/// Bound to a base endpoint and the shared transport. Cheap to clone;
/// never mutated by the calls made through it.
#[derive(Debug, Clone)]
pub struct BackendHandle {
    family: Backend,
    base_url: Url,
    transport: Arc<Transport>,
    request_timeout: Option<Duration>,
}

impl BackendHandle {
    pub fn new(
        family: Backend,
        base_url: Url,
        transport: Arc<Transport>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            family,
            base_url,
            transport,
            request_timeout,
        }
    }

    pub fn family(&self) -> Backend {
        self.family
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Resolve a request target
    ///
    /// Absolute `http(s)://` targets must share the base endpoint's origin,
    /// since requests through a handle are digest-signed. Anything else is
    /// appended to the base endpoint, keeping any path prefix it carries.
    pub fn url(&self, target: &str) -> Result<Url> {
        let invalid =
            |reason: String| CoreError::InvalidArgument(format!("invalid request target '{target}': {reason}"));

        if target.starts_with("http://") || target.starts_with("https://") {
            let url = Url::parse(target).map_err(|e| invalid(e.to_string()))?;
            if url.origin() != self.base_url.origin() {
                return Err(invalid(format!(
                    "origin differs from the {} endpoint {}",
                    self.family,
                    self.base_url.origin().ascii_serialization()
                )));
            }
            return Ok(url);
        }

        let separator = if target.starts_with('/') { "" } else { "/" };
        Url::parse(&format!(
            "{}{separator}{target}",
            self.base_url.as_str().trim_end_matches('/')
        ))
        .map_err(|e| invalid(e.to_string()))
    }

    /// Caller context with the configured default deadline filled in
    pub(crate) fn context(&self, ctx: &CallContext) -> CallContext {
        match (ctx.deadline(), self.request_timeout) {
            (None, Some(timeout)) => ctx.clone().with_timeout(timeout),
            _ => ctx.clone(),
        }
    }

    /// Issue one request and hand the response, whatever its status, to
    /// `on_response`
    ///
    /// Failures before a response are normalized as transport errors. The
    /// whole exchange, including reading the body in `on_response`, is
    /// subject to the context's cancellation and deadline.
    pub(crate) async fn send<T, F, Fut>(
        &self,
        ctx: &CallContext,
        method: Method,
        url: Url,
        body: Option<Bytes>,
        on_response: F,
    ) -> Result<T>
    where
        F: FnOnce(Response) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let path = request_path(&method, &url);
        debug!(backend = %self.family, %path, "API request");

        self.context(ctx)
            .run(&path, async {
                let response = self
                    .transport
                    .execute(method, url, body)
                    .await
                    .map_err(|e| CoreError::Transport(NormalizedError::transport(error_chain(&e))))?;
                on_response(response).await
            })
            .await
    }
}

/// Render an error with its source chain
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Builds and holds one client handle per backend family
///
/// All handles share one lazily built [`Transport`]. Clones of the registry
/// share it too.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    legacy: Url,
    dedicated: Url,
    iam: Url,
    serverless: Url,
    transport: Arc<SharedTransport>,
    request_timeout: Option<Duration>,
}

impl ClientRegistry {
    /// Validate endpoints and prepare the shared transport
    ///
    /// Fails with [`CoreError::Configuration`] if any endpoint is not an
    /// absolute `http(s)` URL or a timeout is zero. No network activity
    /// happens here.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.timeouts.validate()?;
        Self::with_timeouts(
            config,
            config.timeouts.connect_timeout(),
            config.timeouts.request_timeout(),
        )
    }

    fn with_timeouts(
        config: &ClientConfig,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        debug!("Creating TiDB Cloud client registry");

        let legacy = config.endpoint_url(Backend::Legacy)?;
        let dedicated = config.endpoint_url(Backend::Dedicated)?;
        let iam = config.endpoint_url(Backend::Iam)?;
        let serverless = config.endpoint_url(Backend::Serverless)?;

        info!(
            legacy = %legacy,
            dedicated = %dedicated,
            iam = %iam,
            serverless = %serverless,
            "Resolved TiDB Cloud endpoints"
        );

        let settings = TransportSettings {
            credentials: Credentials::new(&config.public_key, &config.private_key),
            user_agent: config.user_agent().to_string(),
            connect_timeout,
        };

        Ok(Self {
            legacy,
            dedicated,
            iam,
            serverless,
            transport: Arc::new(SharedTransport::new(settings)),
            request_timeout,
        })
    }

    pub fn builder() -> ClientRegistryBuilder {
        ClientRegistryBuilder::default()
    }

    /// Build the shared transport now instead of on first use
    pub fn initialize(&self) -> Result<()> {
        self.transport.get()?;
        Ok(())
    }

    /// The shared transport cell
    pub fn shared_transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// The shared transport, built on first use
    pub fn transport(&self) -> Result<Arc<Transport>> {
        Ok(self.transport.get()?)
    }

    pub fn endpoint(&self, backend: Backend) -> &Url {
        match backend {
            Backend::Legacy => &self.legacy,
            Backend::Dedicated => &self.dedicated,
            Backend::Iam => &self.iam,
            Backend::Serverless => &self.serverless,
        }
    }

    /// Handle for one backend family
    pub fn handle(&self, backend: Backend) -> Result<BackendHandle> {
        Ok(BackendHandle::new(
            backend,
            self.endpoint(backend).clone(),
            self.transport()?,
            self.request_timeout,
        ))
    }

    /// Generic request dispatcher for the legacy surface
    pub fn dispatcher(&self) -> Result<Dispatcher> {
        Ok(Dispatcher::new(self.handle(Backend::Legacy)?))
    }

    pub fn legacy(&self) -> Result<LegacyClient> {
        Ok(LegacyClient::new(self.handle(Backend::Legacy)?))
    }

    pub fn dedicated(&self) -> Result<DedicatedClient> {
        Ok(DedicatedClient::new(self.handle(Backend::Dedicated)?))
    }

    pub fn iam(&self) -> Result<IamClient> {
        Ok(IamClient::new(self.handle(Backend::Iam)?))
    }

    pub fn serverless(&self) -> Result<ServerlessClient> {
        Ok(ServerlessClient::new(self.handle(Backend::Serverless)?))
    }

    /// Orchestrator for staged file uploads
    pub fn uploader(&self) -> Result<Uploader> {
        Ok(Uploader::new(self.transport()?, self.request_timeout))
    }
}

/// Builder for [`ClientRegistry`]
#[derive(Debug, Default)]
pub struct ClientRegistryBuilder {
    public_key: String,
    private_key: String,
    endpoints: Vec<(Backend, String)>,
    user_agent: Option<String>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl ClientRegistryBuilder {
    #[must_use]
    pub fn public_key(mut self, key: impl Into<String>) -> Self {
        self.public_key = key.into();
        self
    }

    #[must_use]
    pub fn private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = key.into();
        self
    }

    /// Override one family's base endpoint
    #[must_use]
    pub fn endpoint(mut self, backend: Backend, url: impl Into<String>) -> Self {
        self.endpoints.push((backend, url.into()));
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Default deadline for calls whose context has none
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ClientRegistry> {
        let mut config = ClientConfig::new(self.public_key, self.private_key);
        for (backend, url) in self.endpoints {
            config = config.with_endpoint(backend, url);
        }
        if let Some(user_agent) = self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        let connect_timeout = self
            .connect_timeout
            .unwrap_or_else(|| config.timeouts.connect_timeout());
        check_timeout("connect_timeout", connect_timeout)?;
        if let Some(timeout) = self.request_timeout {
            check_timeout("request_timeout", timeout)?;
        }
        ClientRegistry::with_timeouts(&config, connect_timeout, self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;

    #[test]
    fn test_defaults() {
        let registry = ClientRegistry::new(&ClientConfig::new("pk", "sk")).unwrap();
        assert_eq!(
            registry.endpoint(Backend::Legacy).as_str(),
            "https://api.tidbcloud.com/"
        );
        assert_eq!(
            registry.endpoint(Backend::Serverless).as_str(),
            "https://serverless.tidbapi.com/"
        );
        assert!(!registry.shared_transport().is_initialized());
        assert_eq!(
            registry.shared_transport().settings().user_agent,
            DEFAULT_USER_AGENT
        );
    }

    #[test]
    fn test_invalid_endpoint_is_configuration_error() {
        let err = ClientRegistry::builder()
            .public_key("pk")
            .private_key("sk")
            .endpoint(Backend::Iam, "iam.tidbapi.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(err.to_string().contains("iam"));
    }

    #[test]
    fn test_handles_share_one_transport() {
        let registry = ClientRegistry::builder()
            .public_key("pk")
            .private_key("sk")
            .build()
            .unwrap();

        let handles: Vec<_> = Backend::ALL
            .iter()
            .map(|b| registry.handle(*b).unwrap())
            .collect();
        let cloned = registry.clone();
        let from_clone = cloned.handle(Backend::Legacy).unwrap();

        assert_eq!(registry.shared_transport().build_count(), 1);
        for handle in &handles {
            assert!(Arc::ptr_eq(handle.transport(), handles[0].transport()));
        }
        assert!(Arc::ptr_eq(from_clone.transport(), handles[0].transport()));
    }

    #[test]
    fn test_url_keeps_base_prefix() {
        let registry = ClientRegistry::builder()
            .endpoint(Backend::Dedicated, "http://localhost:9000/proxy/")
            .build()
            .unwrap();
        let handle = registry.handle(Backend::Dedicated).unwrap();

        assert_eq!(
            handle.url("/v1beta1/clusters").unwrap().as_str(),
            "http://localhost:9000/proxy/v1beta1/clusters"
        );
        assert_eq!(
            handle.url("http://localhost:9000/other/path").unwrap().as_str(),
            "http://localhost:9000/other/path"
        );
    }

    #[test]
    fn test_url_rejects_foreign_origin() {
        let registry = ClientRegistry::builder()
            .endpoint(Backend::Legacy, "https://api.tidbcloud.com")
            .build()
            .unwrap();
        let handle = registry.handle(Backend::Legacy).unwrap();

        for target in [
            "https://s3.example.com/bucket/key",
            "http://api.tidbcloud.com/api/v1beta/projects",
            "https://api.tidbcloud.com:8443/api/v1beta/projects",
        ] {
            let err = handle.url(target).unwrap_err();
            assert!(matches!(err, CoreError::InvalidArgument(_)), "{target}: {err:?}");
        }
        assert!(handle.url("https://api.tidbcloud.com/api/v1beta/projects").is_ok());
    }

    #[test]
    fn test_builder_keeps_sub_second_timeouts() {
        let registry = ClientRegistry::builder()
            .connect_timeout(Duration::from_millis(300))
            .request_timeout(Duration::from_millis(500))
            .build()
            .unwrap();

        assert_eq!(
            registry.shared_transport().settings().connect_timeout,
            Duration::from_millis(300)
        );
        let handle = registry.handle(Backend::Legacy).unwrap();
        assert_eq!(handle.request_timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_timeout_is_configuration_error() {
        let err = ClientRegistry::builder()
            .request_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));

        let mut config = ClientConfig::new("pk", "sk");
        config.timeouts.connect_timeout_ms = 0;
        let err = ClientRegistry::new(&config).unwrap_err();
        assert!(err.to_string().contains("connect_timeout_ms"));
    }
}
