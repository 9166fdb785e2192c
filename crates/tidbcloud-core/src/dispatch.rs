//! Generic request dispatcher for the legacy API
//!
//! The legacy surface has no typed client: callers hand in a method, a path
//! and an optional JSON payload. Only HTTP 200 counts as success; 201, 204
//! and every other status are reported as application errors carrying the
//! status and the raw body.

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::api::decode_body;
use crate::context::CallContext;
use crate::error::{CoreError, NormalizedError, Result};
use crate::normalize::request_path;
use crate::registry::BackendHandle;

/// A fully read HTTP 200 response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// `"<METHOD> <url path>"` of the request that produced it
    pub path: String,
}

impl RawResponse {
    /// Decode the body into `T`; an empty body decodes as JSON `null`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        decode_body(&self.path, &self.headers, &self.body)
    }
}

/// Sends arbitrary requests through the legacy backend handle
#[derive(Debug, Clone)]
pub struct Dispatcher {
    handle: BackendHandle,
}

impl Dispatcher {
    pub fn new(handle: BackendHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &BackendHandle {
        &self.handle
    }

    /// Send one request and return the raw response on HTTP 200
    ///
    /// `target` is a path below the legacy endpoint or an absolute URL on
    /// its origin.
    /// `None` and JSON `null` payloads send no body.
    pub async fn dispatch(
        &self,
        ctx: &CallContext,
        method: Method,
        target: &str,
        payload: Option<&Value>,
    ) -> Result<RawResponse> {
        let url = self.handle.url(target)?;
        let path = request_path(&method, &url);
        let body = match payload {
            Some(value) if !value.is_null() => Some(Bytes::from(serde_json::to_vec(value)?)),
            _ => None,
        };

        self.handle
            .send(ctx, method, url, body, |response| async move {
                let status = response.status();
                let headers = response.headers().clone();
                let body = response.bytes().await.map_err(|e| {
                    CoreError::Transport(NormalizedError::from_parts(
                        Some(&path),
                        &format!("failed to read response body: {e}"),
                        &headers,
                        &[],
                    ))
                })?;

                if status.as_u16() != 200 {
                    debug!(%path, status = status.as_u16(), "Legacy API rejected request");
                    return Err(CoreError::Application {
                        status: status.as_u16(),
                        error: NormalizedError::from_parts(
                            Some(&path),
                            &format!("unexpected status {status}"),
                            &headers,
                            &body,
                        ),
                    });
                }

                Ok(RawResponse {
                    status: status.as_u16(),
                    headers,
                    body,
                    path,
                })
            })
            .await
    }

    /// [`dispatch`](Self::dispatch) and decode the body into `T`
    pub async fn dispatch_into<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: Method,
        target: &str,
        payload: Option<&Value>,
    ) -> Result<T> {
        self.dispatch(ctx, method, target, payload).await?.json()
    }
}
