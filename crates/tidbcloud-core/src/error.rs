//! Unified error handling for tidbcloud-core
//!
//! Every failure that touched the network carries a [`NormalizedError`]:
//! the request path, the underlying cause and the server-assigned trace id.
//!
//! # Example
//!
//! ```rust
//! use tidbcloud_core::{CoreError, NormalizedError};
//!
//! fn report(err: &CoreError) {
//!     if err.is_not_found() {
//!         println!("Resource not found");
//!     }
//!     if let Some(trace_id) = err.trace_id() {
//!         println!("trace id: {trace_id}");
//!     }
//! }
//!
//! let err = CoreError::Application {
//!     status: 404,
//!     error: NormalizedError::new("GET /api/v1beta/projects/1", "not found", "abc123"),
//! };
//! assert!(err.is_not_found());
//! assert_eq!(err.trace_id(), Some("abc123"));
//! ```

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Placeholder used when the path or trace id of a failure is not known
pub const UNKNOWN: &str = "<unknown>";

/// Uniform diagnostic produced for every failed call
///
/// Immutable once constructed. Built by the normalizer in [`crate::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    path: String,
    message: String,
    trace_id: String,
}

impl NormalizedError {
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            trace_id: trace_id.into(),
        }
    }

    /// `"<METHOD> <url path>"`, or [`UNKNOWN`]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Server trace id, or [`UNKNOWN`]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn has_trace_id(&self) -> bool {
        self.trace_id != UNKNOWN
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (trace id: {})",
            self.path, self.message, self.trace_id
        )
    }
}

impl std::error::Error for NormalizedError {}

/// Core error type for every operation of this crate
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed endpoint or unusable client settings at construction time
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Network, TLS or protocol failure before any response was received
    #[error("Transport error: {0}")]
    Transport(NormalizedError),

    /// Well-formed response with a rejected status code
    #[error("API error (HTTP {status}): {error}")]
    Application { status: u16, error: NormalizedError },

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(NormalizedError),

    /// The caller's cancellation token fired while the call was in flight
    #[error("Cancelled: {0}")]
    Cancelled(NormalizedError),

    /// The call's deadline passed while it was in flight
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(NormalizedError),

    /// Multipart completion without every issued part acknowledged
    #[error("Upload {upload_id} is incomplete: missing parts {missing:?}")]
    IncompleteUpload { upload_id: String, missing: Vec<u32> },

    /// Upload body produced a byte count different from the declared length
    #[error("Upload body length mismatch: declared {declared} bytes, read {transferred}")]
    UploadLengthMismatch { declared: u64, transferred: u64 },

    /// Local file could not be opened or inspected
    #[error("File error for '{}': {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Request payload could not be serialized
    #[error("Failed to encode request: {0}")]
    Encode(String),

    /// Argument rejected before any network call (e.g. a cursor of the wrong kind)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Encode(err.to_string())
    }
}

impl CoreError {
    /// The normalized diagnostic, for every failure that involved a call
    #[must_use]
    pub fn normalized(&self) -> Option<&NormalizedError> {
        match self {
            CoreError::Transport(e)
            | CoreError::Decode(e)
            | CoreError::Cancelled(e)
            | CoreError::DeadlineExceeded(e) => Some(e),
            CoreError::Application { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Server trace id, when the failure carried one
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.normalized()
            .filter(|e| e.has_trace_id())
            .map(NormalizedError::trace_id)
    }

    /// HTTP status of an application error
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            CoreError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if this is an authentication/authorization error (401/403)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Returns true if this is a conflict/precondition error (409/412)
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(409 | 412))
    }

    /// Returns true if this is a bad request error (400)
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        match self {
            CoreError::InvalidArgument(_) => true,
            _ => self.status() == Some(400),
        }
    }

    /// Returns true if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Returns true if the caller cancelled the call
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled(_))
    }

    /// Returns true if the call ran out of time
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::DeadlineExceeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(status: u16) -> CoreError {
        CoreError::Application {
            status,
            error: NormalizedError::new("GET /v1beta1/clusters", "boom", "trace-1"),
        }
    }

    #[test]
    fn test_status_helpers() {
        assert!(app(404).is_not_found());
        assert!(app(401).is_unauthorized());
        assert!(app(403).is_unauthorized());
        assert!(app(409).is_conflict());
        assert!(app(400).is_bad_request());
        assert!(app(503).is_server_error());
        assert!(!app(404).is_server_error());
    }

    #[test]
    fn test_trace_id_hides_sentinel() {
        assert_eq!(app(500).trace_id(), Some("trace-1"));

        let transport = CoreError::Transport(NormalizedError::new(UNKNOWN, "refused", UNKNOWN));
        assert!(transport.normalized().is_some());
        assert_eq!(transport.trace_id(), None);
        assert_eq!(transport.status(), None);
    }

    #[test]
    fn test_cancellation_kinds() {
        let cancelled = CoreError::Cancelled(NormalizedError::new(UNKNOWN, "cancelled", UNKNOWN));
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_timeout());

        let deadline =
            CoreError::DeadlineExceeded(NormalizedError::new(UNKNOWN, "deadline", UNKNOWN));
        assert!(deadline.is_timeout());
        assert!(!deadline.is_cancelled());
    }

    #[test]
    fn test_invalid_argument_is_bad_request() {
        let err = CoreError::InvalidArgument("page size must be positive".to_string());
        assert!(err.is_bad_request());
        assert!(err.normalized().is_none());
    }

    #[test]
    fn test_display() {
        let err = app(404);
        let text = err.to_string();
        assert!(text.contains("HTTP 404"));
        assert!(text.contains("GET /v1beta1/clusters"));
        assert!(text.contains("trace-1"));

        let incomplete = CoreError::IncompleteUpload {
            upload_id: "u-1".to_string(),
            missing: vec![3],
        };
        assert!(incomplete.to_string().contains("missing parts [3]"));
    }
}
