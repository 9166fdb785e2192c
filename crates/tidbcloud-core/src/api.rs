//! Typed JSON client shared by the dedicated, IAM and serverless façades
//!
//! These families accept any 2xx status as success. The legacy surface goes
//! through [`Dispatcher`](crate::dispatch::Dispatcher) instead, which only
//! accepts 200.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;
use url::Url;

use crate::context::CallContext;
use crate::error::{CoreError, NormalizedError, Result};
use crate::normalize::request_path;
use crate::pagination::{Cursor, Page, PaginationStyle, RawPage, fetch_next_page};
use crate::registry::BackendHandle;

/// Version prefix of the dedicated, IAM and serverless APIs
pub const V1BETA1: &str = "/v1beta1";

/// `{ <items>, next_page_token, total_size }` list envelope
pub trait ListEnvelope: DeserializeOwned + Send {
    type Item: Send;

    fn into_raw_page(self) -> RawPage<Self::Item>;
}

/// Declare a token-paged list envelope whose items live in `$field`
macro_rules! list_envelope {
    ($(#[$meta:meta])* $name:ident, $field:ident: $item:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, serde::Deserialize)]
        pub struct $name {
            #[serde(default)]
            pub $field: Vec<$item>,
            #[serde(default)]
            pub next_page_token: Option<String>,
            #[serde(default, deserialize_with = "crate::api::opt_u64")]
            pub total_size: Option<u64>,
        }

        impl crate::api::ListEnvelope for $name {
            type Item = $item;

            fn into_raw_page(self) -> crate::pagination::RawPage<$item> {
                crate::pagination::RawPage::Token {
                    items: self.$field,
                    next_token: self.next_page_token,
                    total: self.total_size,
                }
            }
        }
    };
}

pub(crate) use list_envelope;

/// JSON client bound to one backend family and API version prefix
#[derive(Debug, Clone)]
pub struct ApiClient {
    handle: BackendHandle,
    prefix: &'static str,
}

impl ApiClient {
    pub fn new(handle: BackendHandle, prefix: &'static str) -> Self {
        Self { handle, prefix }
    }

    pub fn handle(&self) -> &BackendHandle {
        &self.handle
    }

    /// Full URL for a path below the version prefix
    pub fn url(&self, path: &str) -> Result<Url> {
        self.handle.url(&format!("{}{}", self.prefix, path))
    }

    /// URL for a list call, with the cursor's query parameters applied
    pub fn list_url(&self, path: &str, cursor: &Cursor) -> Result<Url> {
        let mut url = self.url(path)?;
        cursor.apply(&mut url);
        Ok(url)
    }

    /// Fetch one token-paged page
    ///
    /// Empty filter values are left out of the query.
    pub async fn list<L: ListEnvelope>(
        &self,
        ctx: &CallContext,
        path: &str,
        filters: &[(&str, &str)],
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<L::Item>> {
        fetch_next_page(PaginationStyle::Token, cursor, page_size, |cursor| async move {
            let mut url = self.list_url(path, &cursor)?;
            {
                let mut query = url.query_pairs_mut();
                for (key, value) in filters.iter().filter(|(_, v)| !v.is_empty()) {
                    query.append_pair(key, value);
                }
            }
            let envelope: L = self.get_url(ctx, url).await?;
            Ok(envelope.into_raw_page())
        })
        .await
    }

    pub async fn get<T: DeserializeOwned>(&self, ctx: &CallContext, path: &str) -> Result<T> {
        self.get_url(ctx, self.url(path)?).await
    }

    pub async fn get_url<T: DeserializeOwned>(&self, ctx: &CallContext, url: Url) -> Result<T> {
        self.request(ctx, Method::GET, url, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = encode(body)?;
        self.request(ctx, Method::POST, self.url(path)?, Some(body))
            .await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = encode(body)?;
        self.request(ctx, Method::PATCH, self.url(path)?, Some(body))
            .await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = encode(body)?;
        self.request(ctx, Method::PUT, self.url(path)?, Some(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, ctx: &CallContext, path: &str) -> Result<T> {
        self.request(ctx, Method::DELETE, self.url(path)?, None)
            .await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: Method,
        url: Url,
        body: Option<Bytes>,
    ) -> Result<T> {
        let request_method = method.clone();
        self.handle
            .send(ctx, method, url, body, |response| {
                handle_response(request_method, response)
            })
            .await
    }
}

pub(crate) fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(body)?))
}

/// Any 2xx is success; everything else is an application error
async fn handle_response<T: DeserializeOwned>(method: Method, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error =
            NormalizedError::from_response(&method, format!("unexpected status {status}"), response)
                .await;
        return Err(CoreError::Application {
            status: status.as_u16(),
            error,
        });
    }
    read_json(&method, response).await
}

/// Read the full body and decode it
pub(crate) async fn read_json<T: DeserializeOwned>(method: &Method, response: Response) -> Result<T> {
    let path = request_path(method, response.url());
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(|e| {
        CoreError::Transport(NormalizedError::from_parts(
            Some(&path),
            &format!("failed to read response body: {e}"),
            &headers,
            &[],
        ))
    })?;
    decode_body(&path, &headers, &body)
}

/// Decode a response body; an empty body decodes as JSON `null`
pub(crate) fn decode_body<T: DeserializeOwned>(
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<T> {
    let source: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };
    trace!(path, bytes = body.len(), "Decoding response body");

    serde_json::from_slice(source).map_err(|e| {
        CoreError::Decode(NormalizedError::from_parts(
            Some(path),
            &format!("failed to decode response: {e}"),
            headers,
            body,
        ))
    })
}

/// Percent-encode one path segment
pub(crate) fn segment(value: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(value)
}

/// Accept a count as either a JSON number or a decimal string
///
/// The newer APIs encode 64-bit integers as strings.
pub(crate) fn opt_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Number(n)) => Ok(Some(n)),
        Some(Count::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Count::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde::de::IgnoredAny;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: String,
    }

    #[test]
    fn test_decode_empty_body() {
        let headers = HeaderMap::new();
        let _: IgnoredAny = decode_body("DELETE /x", &headers, b"").unwrap();
        let _: IgnoredAny = decode_body("DELETE /x", &headers, b" \n").unwrap();
        let value: Option<Thing> = decode_body("GET /x", &headers, b"").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_decode_failure_keeps_body() {
        let err = decode_body::<Thing>("GET /v1beta1/clusters/1", &HeaderMap::new(), b"{\"id\":7}")
            .unwrap_err();
        let CoreError::Decode(error) = err else {
            panic!("expected decode error, got {err:?}");
        };
        assert_eq!(error.path(), "GET /v1beta1/clusters/1");
        assert!(error.message().contains("failed to decode response"));
        assert!(error.message().contains("{\"id\":7}"));
    }

    #[test]
    fn test_count_as_number_or_string() {
        #[derive(Deserialize)]
        struct Listing {
            #[serde(default, deserialize_with = "opt_u64")]
            total: Option<u64>,
        }

        let parse = |json: &str| serde_json::from_str::<Listing>(json).unwrap().total;
        assert_eq!(parse(r#"{"total": 12}"#), Some(12));
        assert_eq!(parse(r#"{"total": "12"}"#), Some(12));
        assert_eq!(parse(r#"{"total": null}"#), None);
        assert_eq!(parse(r#"{}"#), None);
        assert!(serde_json::from_str::<Listing>(r#"{"total": "many"}"#).is_err());
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("abc"), "abc");
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }
}
