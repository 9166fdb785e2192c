//! Staged file uploads
//!
//! Two protocols move local files into object storage ahead of an import:
//!
//! - **Single PUT** (legacy API): ask for a pre-signed URL, then PUT the
//!   whole file with an exact `Content-Length`. See [`Uploader::upload_file`].
//! - **Multipart** (serverless API): start an upload to get one pre-signed
//!   URL per part, PUT each part, acknowledge its ETag, then complete or
//!   cancel. See [`Uploader::start_multipart`].
//!
//! Both go through the states of [`UploadState`]. PUTs to pre-signed URLs
//! carry the identification header but no digest authorization, and only
//! HTTP 200 counts as success.
//!
//! # Example
//!
//! ```rust,ignore
//! let uploader = registry.uploader()?;
//! let mut upload = uploader
//!     .start_multipart(&ctx, &serverless, "10086", "data.csv", len, 2)
//!     .await?;
//! uploader.upload_part(&ctx, &mut upload, 1, first_half, half).await?;
//! uploader.upload_part(&ctx, &mut upload, 2, second_half, len - half).await?;
//! uploader.complete_multipart(&ctx, &serverless, &mut upload).await?;
//! ```

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{ETAG, HeaderMap};
use reqwest::{Body, Method};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;

use crate::context::CallContext;
use crate::error::{CoreError, NormalizedError, Result};
use crate::legacy::{LegacyApi, UploadUrlRequest};
use crate::normalize::request_path;
use crate::registry::error_chain;
use crate::serverless::{
    CompleteUploadRequest, CompletedPart, ServerlessApi, StartUploadRequest, StartUploadResponse,
};
use crate::transport::Transport;

/// Lifecycle of an upload session
///
/// `Requested -> UrlIssued -> Uploading -> Uploaded`, and `Failed` from any
/// state that is not terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Requested,
    UrlIssued,
    Uploading,
    Uploaded,
    Failed,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Uploaded | UploadState::Failed)
    }

    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        match (self, next) {
            (Requested, UrlIssued) | (UrlIssued, Uploading) | (Uploading, Uploaded) => true,
            (Uploading, Uploading) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadState::Requested => "requested",
            UploadState::UrlIssued => "url-issued",
            UploadState::Uploading => "uploading",
            UploadState::Uploaded => "uploaded",
            UploadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn advance(state: &mut UploadState, next: UploadState, id: &str) -> Result<()> {
    if !state.can_transition_to(next) {
        return Err(CoreError::InvalidArgument(format!(
            "upload {id} cannot move from {state} to {next}"
        )));
    }
    debug!(upload = id, from = %state, to = %next, "Upload state change");
    *state = next;
    Ok(())
}

/// A finished single-PUT upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    pub path: PathBuf,
    pub file_name: String,
    pub content_length: u64,
    /// Name to reference the object by when creating the import
    pub new_file_name: String,
    pub state: UploadState,
}

/// A multipart upload session opened on the serverless API
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    cluster_id: String,
    upload_id: String,
    issued: BTreeMap<u32, String>,
    acknowledged: BTreeMap<u32, String>,
    state: UploadState,
}

impl MultipartUpload {
    /// Session for the parts the backend issued
    pub fn new(cluster_id: impl Into<String>, started: StartUploadResponse) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            upload_id: started.upload_id,
            issued: started
                .parts
                .into_iter()
                .map(|part| (part.part_number, part.url))
                .collect(),
            acknowledged: BTreeMap::new(),
            state: UploadState::UrlIssued,
        }
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Part numbers the backend issued URLs for, ascending
    pub fn issued_parts(&self) -> Vec<u32> {
        self.issued.keys().copied().collect()
    }

    pub fn part_url(&self, part_number: u32) -> Option<&str> {
        self.issued.get(&part_number).map(String::as_str)
    }

    /// Record the ETag returned for an uploaded part
    ///
    /// Acknowledging a part again replaces its ETag. Parts the backend did
    /// not issue are rejected. Use this directly when the part bodies were
    /// sent by other means than [`Uploader::upload_part`].
    pub fn acknowledge(&mut self, part_number: u32, etag: impl Into<String>) -> Result<()> {
        if !self.issued.contains_key(&part_number) {
            return Err(CoreError::InvalidArgument(format!(
                "part {part_number} was not issued for upload {}",
                self.upload_id
            )));
        }
        if self.state.is_terminal() {
            return Err(CoreError::InvalidArgument(format!(
                "upload {} is already {}",
                self.upload_id, self.state
            )));
        }
        if self.state == UploadState::UrlIssued {
            self.state = UploadState::Uploading;
        }
        self.acknowledged.insert(part_number, etag.into());
        Ok(())
    }

    /// Issued parts with no acknowledged ETag, ascending
    pub fn missing_parts(&self) -> Vec<u32> {
        self.issued
            .keys()
            .filter(|n| !self.acknowledged.contains_key(*n))
            .copied()
            .collect()
    }

    /// Completion body, or [`CoreError::IncompleteUpload`] if any issued part
    /// is unacknowledged
    pub fn completion_request(&self) -> Result<CompleteUploadRequest> {
        let missing = self.missing_parts();
        if !missing.is_empty() {
            return Err(CoreError::IncompleteUpload {
                upload_id: self.upload_id.clone(),
                missing,
            });
        }
        Ok(CompleteUploadRequest {
            upload_id: self.upload_id.clone(),
            parts: self
                .acknowledged
                .iter()
                .map(|(part_number, etag)| CompletedPart {
                    part_number: *part_number,
                    etag: etag.clone(),
                })
                .collect(),
        })
    }
}

/// Stream adapter that fails unless exactly `declared` bytes pass through
///
/// On mismatch the byte count seen so far is recorded in `mismatch` so the
/// caller can report it after the HTTP client swallowed the stream error.
struct ExactLength<S> {
    inner: S,
    declared: u64,
    transferred: u64,
    mismatch: Arc<OnceLock<u64>>,
    done: bool,
}

impl<S> ExactLength<S> {
    fn new(inner: S, declared: u64, mismatch: Arc<OnceLock<u64>>) -> Self {
        Self {
            inner,
            declared,
            transferred: 0,
            mismatch,
            done: false,
        }
    }

    fn fail(&mut self) -> io::Error {
        self.done = true;
        let _ = self.mismatch.set(self.transferred);
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "body length mismatch: declared {} bytes, read {}",
                self.declared, self.transferred
            ),
        )
    }
}

impl<S> Stream for ExactLength<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                self.transferred += chunk.len() as u64;
                if self.transferred > self.declared {
                    return Poll::Ready(Some(Err(self.fail())));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if self.transferred < self.declared {
                    return Poll::Ready(Some(Err(self.fail())));
                }
                self.done = true;
                Poll::Ready(None)
            }
        }
    }
}

/// Sends upload bodies to pre-signed URLs and drives upload sessions
#[derive(Debug, Clone)]
pub struct Uploader {
    transport: Arc<Transport>,
    request_timeout: Option<Duration>,
}

impl Uploader {
    pub fn new(transport: Arc<Transport>, request_timeout: Option<Duration>) -> Self {
        Self {
            transport,
            request_timeout,
        }
    }

    fn context(&self, ctx: &CallContext) -> CallContext {
        match (ctx.deadline(), self.request_timeout) {
            (None, Some(timeout)) => ctx.clone().with_timeout(timeout),
            _ => ctx.clone(),
        }
    }

    /// Upload a local file through the legacy upload URL protocol
    ///
    /// Stats the file, asks the backend for an upload URL sized to it, then
    /// PUTs the file contents. The file is opened only for the PUT and
    /// closed when it finishes, successfully or not.
    pub async fn upload_file<A: LegacyApi + ?Sized>(
        &self,
        ctx: &CallContext,
        api: &A,
        project_id: &str,
        cluster_id: &str,
        path: &Path,
    ) -> Result<StagedUpload> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| CoreError::File {
                path: path.to_path_buf(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(CoreError::InvalidArgument(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CoreError::InvalidArgument(format!("'{}' has no file name", path.display()))
            })?;
        let content_length = metadata.len();

        let mut state = UploadState::Requested;
        debug!(file = %path.display(), content_length, "Requesting upload URL");

        let issued = api
            .generate_upload_url(
                ctx,
                project_id,
                cluster_id,
                &UploadUrlRequest {
                    file_name: file_name.clone(),
                    content_length,
                },
            )
            .await;
        let issued = match issued {
            Ok(issued) => issued,
            Err(e) => {
                advance(&mut state, UploadState::Failed, &file_name)?;
                return Err(e);
            }
        };
        advance(&mut state, UploadState::UrlIssued, &file_name)?;

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| CoreError::File {
                path: path.to_path_buf(),
                source,
            })?;

        advance(&mut state, UploadState::Uploading, &file_name)?;
        if let Err(e) = self
            .put_object(ctx, &issued.upload_url, file, content_length)
            .await
        {
            warn!(file = %path.display(), error = %e, "Upload failed");
            advance(&mut state, UploadState::Failed, &file_name)?;
            return Err(e);
        }
        advance(&mut state, UploadState::Uploaded, &file_name)?;

        info!(
            file = %path.display(),
            new_file_name = %issued.new_file_name,
            content_length,
            "File uploaded"
        );
        Ok(StagedUpload {
            path: path.to_path_buf(),
            file_name,
            content_length,
            new_file_name: issued.new_file_name,
            state,
        })
    }

    /// PUT `declared_len` bytes from `reader` to a pre-signed URL
    ///
    /// Fails with [`CoreError::UploadLengthMismatch`] if the reader yields
    /// fewer or more bytes than declared. Only HTTP 200 is success.
    pub async fn put_object<R>(
        &self,
        ctx: &CallContext,
        url: &str,
        reader: R,
        declared_len: u64,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        self.put(ctx, url, reader, declared_len).await.map(|_| ())
    }

    async fn put<R>(
        &self,
        ctx: &CallContext,
        url: &str,
        reader: R,
        declared_len: u64,
    ) -> Result<HeaderMap>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let parsed = Url::parse(url)
            .map_err(|e| CoreError::InvalidArgument(format!("invalid upload URL: {e}")))?;
        let path = request_path(&Method::PUT, &parsed);

        let mismatch = Arc::new(OnceLock::new());
        let stream = ExactLength::new(
            ReaderStream::new(Box::pin(reader)),
            declared_len,
            Arc::clone(&mismatch),
        );
        let body = Body::wrap_stream(stream);
        let length_error = |transferred: u64| CoreError::UploadLengthMismatch {
            declared: declared_len,
            transferred,
        };

        debug!(%path, declared_len, "Uploading object");
        self.context(ctx)
            .run(&path, async {
                let response = match self.transport.put_presigned(url, body, declared_len).await {
                    Ok(response) => response,
                    Err(e) => {
                        if let Some(transferred) = mismatch.get() {
                            return Err(length_error(*transferred));
                        }
                        return Err(CoreError::Transport(NormalizedError::transport(
                            error_chain(&e),
                        )));
                    }
                };
                if let Some(transferred) = mismatch.get() {
                    return Err(length_error(*transferred));
                }

                let status = response.status();
                if status.as_u16() != 200 {
                    let error = NormalizedError::from_response(
                        &Method::PUT,
                        format!("unexpected status {status}"),
                        response,
                    )
                    .await;
                    return Err(CoreError::Application {
                        status: status.as_u16(),
                        error,
                    });
                }
                Ok(response.headers().clone())
            })
            .await
    }

    /// Open a multipart upload of `part_count` parts
    pub async fn start_multipart<A: ServerlessApi + ?Sized>(
        &self,
        ctx: &CallContext,
        api: &A,
        cluster_id: &str,
        file_name: &str,
        content_length: u64,
        part_count: u32,
    ) -> Result<MultipartUpload> {
        if part_count == 0 {
            return Err(CoreError::InvalidArgument(
                "part count must be greater than zero".to_string(),
            ));
        }

        let started = api
            .start_upload(
                ctx,
                cluster_id,
                &StartUploadRequest {
                    file_name: file_name.to_string(),
                    content_length,
                    part_count,
                },
            )
            .await?;
        let upload = MultipartUpload::new(cluster_id, started);
        info!(
            upload_id = %upload.upload_id,
            parts = upload.issued.len(),
            "Multipart upload started"
        );
        Ok(upload)
    }

    /// PUT one part and acknowledge the ETag the storage returned
    pub async fn upload_part<R>(
        &self,
        ctx: &CallContext,
        upload: &mut MultipartUpload,
        part_number: u32,
        reader: R,
        len: u64,
    ) -> Result<String>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let url = upload
            .part_url(part_number)
            .ok_or_else(|| {
                CoreError::InvalidArgument(format!(
                    "part {part_number} was not issued for upload {}",
                    upload.upload_id
                ))
            })?
            .to_string();
        if upload.state.is_terminal() {
            return Err(CoreError::InvalidArgument(format!(
                "upload {} is already {}",
                upload.upload_id, upload.state
            )));
        }
        advance(&mut upload.state, UploadState::Uploading, &upload.upload_id)?;

        let headers = match self.put(ctx, &url, reader, len).await {
            Ok(headers) => headers,
            Err(e) => {
                advance(&mut upload.state, UploadState::Failed, &upload.upload_id)?;
                return Err(e);
            }
        };

        let Some(etag) = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            advance(&mut upload.state, UploadState::Failed, &upload.upload_id)?;
            let path = Url::parse(&url)
                .map(|u| request_path(&Method::PUT, &u))
                .unwrap_or_default();
            return Err(CoreError::Decode(NormalizedError::from_parts(
                Some(&path),
                &format!("part {part_number} response carried no ETag"),
                &headers,
                &[],
            )));
        };

        let etag = etag.to_string();
        upload.acknowledge(part_number, etag.clone())?;
        debug!(upload_id = %upload.upload_id, part_number, "Part uploaded");
        Ok(etag)
    }

    /// Complete a multipart upload
    ///
    /// Checks before any network call that every issued part was
    /// acknowledged, and fails with [`CoreError::IncompleteUpload`] listing
    /// the missing parts otherwise. That failure leaves the session open so
    /// the missing parts can still be uploaded.
    pub async fn complete_multipart<A: ServerlessApi + ?Sized>(
        &self,
        ctx: &CallContext,
        api: &A,
        upload: &mut MultipartUpload,
    ) -> Result<()> {
        let request = upload.completion_request()?;
        if upload.state != UploadState::Uploading {
            return Err(CoreError::InvalidArgument(format!(
                "upload {} cannot be completed while {}",
                upload.upload_id, upload.state
            )));
        }

        match api.complete_upload(ctx, &upload.cluster_id, &request).await {
            Ok(()) => {
                advance(&mut upload.state, UploadState::Uploaded, &upload.upload_id)?;
                info!(upload_id = %upload.upload_id, "Multipart upload completed");
                Ok(())
            }
            Err(e) => {
                advance(&mut upload.state, UploadState::Failed, &upload.upload_id)?;
                Err(e)
            }
        }
    }

    /// Abandon a multipart upload
    ///
    /// Allowed in every state except `Uploaded`; a failed session can still
    /// be cancelled to release it on the backend.
    pub async fn cancel_multipart<A: ServerlessApi + ?Sized>(
        &self,
        ctx: &CallContext,
        api: &A,
        upload: &mut MultipartUpload,
    ) -> Result<()> {
        if upload.state == UploadState::Uploaded {
            return Err(CoreError::InvalidArgument(format!(
                "upload {} is already complete",
                upload.upload_id
            )));
        }

        api.cancel_upload(ctx, &upload.cluster_id, &upload.upload_id)
            .await?;
        if upload.state != UploadState::Failed {
            advance(&mut upload.state, UploadState::Failed, &upload.upload_id)?;
        }
        info!(upload_id = %upload.upload_id, "Multipart upload cancelled");
        Ok(())
    }
}
