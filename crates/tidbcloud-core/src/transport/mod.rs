//! Authenticated HTTP transport shared by every backend family
//!
//! A [`Transport`] wraps one `reqwest::Client`, the API key pair and the
//! identification string. Every request it sends carries the `User-Agent`
//! header; requests to the control-plane APIs additionally answer the
//! server's digest challenge.
//!
//! [`SharedTransport`] owns the one-time construction. It is a plain value
//! the [`ClientRegistry`](crate::ClientRegistry) creates and hands out by
//! reference, not a process global.

pub mod digest;

use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, USER_AGENT};
use reqwest::{Body, Method, Response, StatusCode};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::config::ConfigError;
use digest::{DigestChallenge, generate_cnonce};

/// Public/private API key pair used as digest username/password
#[derive(Clone)]
pub struct Credentials {
    public_key: String,
    private_key: String,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"<REDACTED>")
            .finish()
    }
}

/// Inputs for building a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub credentials: Credentials,
    pub user_agent: String,
    pub connect_timeout: Duration,
}

struct DigestState {
    challenge: DigestChallenge,
    nonce_count: u32,
}

/// One authenticated HTTP execution object
///
/// Read-only after construction apart from the cached digest challenge,
/// which sits behind its own short-lived lock.
pub struct Transport {
    http: reqwest::Client,
    credentials: Credentials,
    user_agent: HeaderValue,
    digest: Mutex<Option<DigestState>>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("credentials", &self.credentials)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Build a transport; fails only if the HTTP client cannot be initialised
    pub fn build(settings: &TransportSettings) -> Result<Self, ConfigError> {
        let user_agent = HeaderValue::from_str(&settings.user_agent).map_err(|e| {
            ConfigError::HttpClient(format!(
                "invalid identification string '{}': {e}",
                settings.user_agent
            ))
        })?;

        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        debug!(
            user_agent = %settings.user_agent,
            "Transport created"
        );
        trace!(
            "Public key: {}...",
            settings
                .credentials
                .public_key
                .chars()
                .take(4)
                .collect::<String>()
        );

        Ok(Self {
            http,
            credentials: settings.credentials.clone(),
            user_agent,
            digest: Mutex::new(None),
        })
    }

    /// Identification string sent with every request
    pub fn user_agent(&self) -> &str {
        self.user_agent.to_str().unwrap_or_default()
    }

    /// Send a digest-authenticated control-plane request
    ///
    /// The body is `Bytes` so it can be sent again when the server answers
    /// with a fresh challenge.
    pub async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
    ) -> reqwest::Result<Response> {
        let preauth = self.cached_authorization(&method, &url);
        let response = self
            .send(&method, &url, body.clone(), preauth.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(challenge) = DigestChallenge::from_headers(response.headers()) else {
            return Ok(response);
        };

        debug!(
            realm = %challenge.realm,
            stale = challenge.stale,
            "Answering digest challenge"
        );
        let authorization = self.accept_challenge(challenge, &method, &url);
        self.send(&method, &url, body, Some(&authorization)).await
    }

    /// Send a PUT to a pre-signed URL: identification header, no digest
    pub async fn put_presigned(
        &self,
        url: &str,
        body: Body,
        content_length: u64,
    ) -> reqwest::Result<Response> {
        trace!(content_length, "PUT to pre-signed URL");
        self.http
            .put(url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<Bytes>,
        authorization: Option<&str>,
    ) -> reqwest::Result<Response> {
        trace!(%method, url = %url, authorized = authorization.is_some(), "HTTP request");

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "application/json");

        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        request.send().await
    }

    fn cached_authorization(&self, method: &Method, url: &Url) -> Option<String> {
        let mut guard = self.digest.lock().unwrap_or_else(PoisonError::into_inner);
        let state = guard.as_mut()?;
        state.nonce_count += 1;
        Some(self.authorize(&state.challenge, state.nonce_count, method, url))
    }

    fn accept_challenge(&self, challenge: DigestChallenge, method: &Method, url: &Url) -> String {
        let authorization = self.authorize(&challenge, 1, method, url);
        let mut guard = self.digest.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(DigestState {
            challenge,
            nonce_count: 1,
        });
        authorization
    }

    fn authorize(
        &self,
        challenge: &DigestChallenge,
        nonce_count: u32,
        method: &Method,
        url: &Url,
    ) -> String {
        let uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        challenge.authorization(
            &self.credentials.public_key,
            &self.credentials.private_key,
            method.as_str(),
            &uri,
            nonce_count,
            &generate_cnonce(),
        )
    }
}

/// Lazily constructed, process-lifetime [`Transport`]
///
/// The first caller of [`get`](Self::get) builds the transport while holding
/// the init mutex; racing callers block on that mutex, re-check the cell and
/// reuse the result. Once set, reads go through the `OnceLock` without
/// locking.
#[derive(Debug)]
pub struct SharedTransport {
    settings: TransportSettings,
    cell: OnceLock<Arc<Transport>>,
    init: Mutex<()>,
    builds: AtomicUsize,
}

impl SharedTransport {
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings,
            cell: OnceLock::new(),
            init: Mutex::new(()),
            builds: AtomicUsize::new(0),
        }
    }

    /// Get the transport, building it on first use
    pub fn get(&self) -> Result<Arc<Transport>, ConfigError> {
        if let Some(transport) = self.cell.get() {
            return Ok(Arc::clone(transport));
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(transport) = self.cell.get() {
            return Ok(Arc::clone(transport));
        }

        let transport = Arc::new(Transport::build(&self.settings)?);
        self.builds.fetch_add(1, Ordering::SeqCst);
        let _ = self.cell.set(Arc::clone(&transport));
        Ok(transport)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Number of times the transport was constructed (0 or 1)
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }
}
