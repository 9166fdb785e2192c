//! # tidbcloud-core
//!
//! Control-plane access layer for TiDB Cloud. One [`ClientRegistry`] gives
//! typed clients for the four independently versioned API surfaces, all
//! sharing a single digest-authenticated HTTP transport:
//!
//! | Family     | Client                | Endpoint                          |
//! |------------|-----------------------|-----------------------------------|
//! | legacy     | [`LegacyClient`]      | `https://api.tidbcloud.com`       |
//! | dedicated  | [`DedicatedClient`]   | `https://dedicated.tidbapi.com`   |
//! | IAM        | [`IamClient`]         | `https://iam.tidbapi.com`         |
//! | serverless | [`ServerlessClient`]  | `https://serverless.tidbapi.com`  |
//!
//! ## Layers
//!
//! - **Transport** ([`transport`]) - one `reqwest` client plus the API key
//!   pair, built lazily exactly once and answering digest challenges.
//! - **Registry** ([`registry`]) - validates endpoints and hands out
//!   per-family handles over the shared transport.
//! - **Façades** ([`legacy`], [`dedicated`], [`iam`], [`serverless`]) - one
//!   trait per family with an HTTP implementation, so higher layers can be
//!   tested against fakes.
//! - **Dispatcher** ([`dispatch`]) - generic method/path/payload requests
//!   for the legacy API, where only HTTP 200 is success.
//! - **Uploads** ([`upload`]) - single pre-signed PUT and multipart staging.
//! - **Pagination** ([`pagination`]) - one [`Cursor`] for both page-number
//!   and page-token listings.
//!
//! Every failure is a [`CoreError`]; anything that reached the network
//! carries a [`NormalizedError`] with the request path and the server trace
//! id. Nothing is retried.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tidbcloud_core::{CallContext, ClientRegistry, ServerlessApi};
//! use std::time::Duration;
//!
//! let registry = ClientRegistry::builder()
//!     .public_key(std::env::var("TIDBCLOUD_PUBLIC_KEY")?)
//!     .private_key(std::env::var("TIDBCLOUD_PRIVATE_KEY")?)
//!     .build()?;
//!
//! let ctx = CallContext::new().with_timeout(Duration::from_secs(30));
//! let page = registry.serverless()?.list_clusters(&ctx, None, None, 50).await?;
//! for cluster in page.items {
//!     println!("{} {}", cluster.cluster_id, cluster.state);
//! }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod dedicated;
pub mod dispatch;
pub mod error;
pub mod iam;
pub mod legacy;
pub mod normalize;
pub mod pagination;
pub mod registry;
pub mod serverless;
pub mod transport;
pub mod upload;

pub use config::{Backend, ClientConfig, ConfigError};
pub use context::CallContext;
pub use dedicated::{DedicatedApi, DedicatedClient};
pub use dispatch::{Dispatcher, RawResponse};
pub use error::{CoreError, NormalizedError, Result};
pub use iam::{IamApi, IamClient};
pub use legacy::{LegacyApi, LegacyClient};
pub use normalize::{TRACE_ID_HEADER, normalize};
pub use pagination::{Cursor, Page, PaginationStyle};
pub use registry::{BackendHandle, ClientRegistry, ClientRegistryBuilder};
pub use serverless::{ServerlessApi, ServerlessClient};
pub use transport::{Credentials, SharedTransport, Transport};
pub use upload::{MultipartUpload, StagedUpload, UploadState, Uploader};

// Re-export for callers building cancellation tokens
pub use tokio_util::sync::CancellationToken;
