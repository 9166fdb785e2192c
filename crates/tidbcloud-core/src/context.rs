//! Per-call cancellation and deadlines
//!
//! Every operation takes a [`CallContext`]. Cancelling its token or passing
//! its deadline aborts the in-flight call, which then returns
//! [`CoreError::Cancelled`] or [`CoreError::DeadlineExceeded`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, NormalizedError, Result};

/// Cancellation signal and optional deadline for one or more calls
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Context driven by an existing cancellation token
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Set the deadline to `timeout` from now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline, keeping the earlier one if already set
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Token that cancels calls made with this context
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` unless the context is cancelled or times out first
    ///
    /// `path` labels the diagnostic of the cancellation error. Dropping
    /// `fut` aborts the underlying request.
    pub async fn run<T, F>(&self, path: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(cancelled(path));
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(path)),
            _ = deadline => Err(CoreError::DeadlineExceeded(NormalizedError::new(
                path,
                "deadline exceeded before the call completed",
                crate::error::UNKNOWN,
            ))),
            result = fut => result,
        }
    }
}

fn cancelled(path: &str) -> CoreError {
    CoreError::Cancelled(NormalizedError::new(
        path,
        "call cancelled by caller",
        crate::error::UNKNOWN,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = CallContext::new();
        let value = ctx.run("GET /x", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let ctx = CallContext::new();
        ctx.cancel();
        let err = ctx.run("GET /x", async { Ok(()) }).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.normalized().unwrap().path(), "GET /x");
    }

    #[tokio::test]
    async fn test_cancel_in_flight() {
        let token = CancellationToken::new();
        let ctx = CallContext::with_cancellation(token.clone());

        let handle = tokio::spawn(async move {
            ctx.run("GET /slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
        });

        token.cancel();
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let err = ctx
            .run("GET /slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_with_deadline_keeps_earliest() {
        let now = Instant::now();
        let ctx = CallContext::new()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(5)));
    }
}
