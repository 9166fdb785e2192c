//! Error normalization
//!
//! Converts any failure into a [`NormalizedError`]. Pure transport failures
//! have no response, so their path and trace id are [`UNKNOWN`]. Failures
//! with a response drain the body and pick the trace id from
//! [`TRACE_ID_HEADER`].

use reqwest::header::HeaderMap;
use reqwest::{Method, Response};
use std::fmt::Display;
use url::Url;

use crate::error::{NormalizedError, UNKNOWN};

/// Diagnostic header carrying the server-assigned trace id
pub const TRACE_ID_HEADER: &str = "x-debug-trace-id";

/// `"<METHOD> <url path>"`
pub fn request_path(method: &Method, url: &Url) -> String {
    format!("{} {}", method, url.path())
}

/// Trace id from the response headers, or [`UNKNOWN`]
pub fn trace_id(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| UNKNOWN.to_string(), str::to_string)
}

impl NormalizedError {
    /// Failure without any response (DNS, TLS, refused, timeout, cancellation)
    pub fn transport(cause: impl Display) -> Self {
        NormalizedError::new(UNKNOWN, cause.to_string(), UNKNOWN)
    }

    /// Pure core of the normalizer: same inputs, same output
    pub fn from_parts(path: Option<&str>, cause: &str, headers: &HeaderMap, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body);
        let body = body.trim();
        let message = if body.is_empty() {
            cause.to_string()
        } else {
            format!("{cause}: {body}")
        };

        NormalizedError::new(path.unwrap_or(UNKNOWN), message, trace_id(headers))
    }

    /// Normalize a failure that produced a response
    ///
    /// The response is consumed: its body is fully drained and the
    /// connection released whether reading succeeds or not.
    pub async fn from_response(method: &Method, cause: impl Display, response: Response) -> Self {
        let path = request_path(method, response.url());
        drain(Some(&path), &cause.to_string(), response).await
    }
}

async fn drain(path: Option<&str>, cause: &str, response: Response) -> NormalizedError {
    let headers = response.headers().clone();
    match response.bytes().await {
        Ok(body) => NormalizedError::from_parts(path, cause, &headers, &body),
        Err(e) => NormalizedError::from_parts(
            path,
            &format!("{cause}: failed to read response body: {e}"),
            &headers,
            &[],
        ),
    }
}

/// Normalize an optional failure with an optional response
///
/// Returns `None` when there is no error. Without a response the result is
/// a transport-level diagnostic. When `method` is unknown the path is just
/// the URL path.
pub async fn normalize<E: Display>(
    err: Option<E>,
    method: Option<&Method>,
    response: Option<Response>,
) -> Option<NormalizedError> {
    let err = err?;
    let Some(response) = response else {
        return Some(NormalizedError::transport(err));
    };

    let path = match method {
        Some(method) => request_path(method, response.url()),
        None => response.url().path().to_string(),
    };
    Some(drain(Some(&path), &err.to_string(), response).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with_trace(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_trace_id_present() {
        let err = NormalizedError::from_parts(
            Some("GET /api/v1beta/projects"),
            "unexpected status 500",
            &headers_with_trace("5f2a9c"),
            b"oops",
        );
        assert_eq!(err.trace_id(), "5f2a9c");
        assert_eq!(err.path(), "GET /api/v1beta/projects");
        assert_eq!(err.message(), "unexpected status 500: oops");
    }

    #[test]
    fn test_trace_id_absent_uses_sentinel() {
        let err = NormalizedError::from_parts(None, "boom", &HeaderMap::new(), b"");
        assert_eq!(err.trace_id(), UNKNOWN);
        assert_eq!(err.path(), UNKNOWN);
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn test_blank_trace_header_is_absent() {
        let err = NormalizedError::from_parts(None, "boom", &headers_with_trace("  "), b"");
        assert_eq!(err.trace_id(), UNKNOWN);
    }

    #[test]
    fn test_deterministic() {
        let headers = headers_with_trace("abc");
        let a = NormalizedError::from_parts(Some("DELETE /x"), "cause", &headers, b"{\"code\":1}");
        let b = NormalizedError::from_parts(Some("DELETE /x"), "cause", &headers, b"{\"code\":1}");
        assert_eq!(a, b);
    }

    #[test]
    fn test_transport_failure() {
        let err = NormalizedError::transport("connection refused");
        assert_eq!(err.path(), UNKNOWN);
        assert_eq!(err.trace_id(), UNKNOWN);
        assert_eq!(err.message(), "connection refused");
    }

    #[tokio::test]
    async fn test_normalize_without_error_is_none() {
        let result = normalize::<&str>(None, None, None).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_normalize_without_response() {
        let result = normalize(Some("dns failure"), Some(&Method::GET), None)
            .await
            .unwrap();
        assert_eq!(result, NormalizedError::transport("dns failure"));
    }

    #[test]
    fn test_request_path() {
        let url = Url::parse("https://api.tidbcloud.com/api/v1beta/projects?page=2").unwrap();
        assert_eq!(request_path(&Method::GET, &url), "GET /api/v1beta/projects");
    }
}
