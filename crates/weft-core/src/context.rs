//! Request-scoped context: deadline and cancellation.
//!
//! Every backend call made on behalf of a search runs under
//! [`RequestContext::guard`], which races the call against the request
//! deadline and the cancellation token. Dropping the losing future is what
//! cancels an in-flight backend call.
//!
//! # Usage
//!
//! ```rust
//! use std::time::Duration;
//! use weft_core::RequestContext;
//!
//! # tokio_test::block_on(async {
//! let ctx = RequestContext::new(Duration::from_secs(1));
//! let value = ctx.guard(async { Ok::<_, weft_core::Error>(42) }).await.unwrap();
//! assert_eq!(value, 42);
//! # });
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Per-request deadline and cancellation handle.
///
/// Cheap to clone; clones share the same token and deadline.
#[derive(Clone, Debug)]
pub struct RequestContext {
    started_at: Instant,
    deadline: Instant,
    token: CancellationToken,
}

impl RequestContext {
    /// Creates a context whose deadline is `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_token(timeout, CancellationToken::new())
    }

    /// Creates a context that is also cancelled when `parent` is.
    ///
    /// The request gets a child token, so cancelling the request itself never
    /// cancels the caller's token.
    pub fn with_parent(timeout: Duration, parent: &CancellationToken) -> Self {
        Self::with_token(timeout, parent.child_token())
    }

    fn with_token(timeout: Duration, token: CancellationToken) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: started_at + timeout,
            token,
        }
    }

    /// The instant at which the request expires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline (zero once elapsed).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Whether the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the request and every call guarded by it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The request's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Runs `fut` until it completes, the deadline elapses, or the request is
    /// cancelled, whichever happens first.
    ///
    /// Cancellation wins ties so a disconnected caller never waits on a
    /// backend.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(self.deadline_error()),
            result = fut => result,
        }
    }

    /// Builds the error reported when the deadline fires.
    pub fn deadline_error(&self) -> Error {
        Error::DeadlineExceeded {
            elapsed_ms: u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
