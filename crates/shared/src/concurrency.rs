//! Request-scoped context: correlation id plus cooperative cancellation.
//!
//! Every port call receives a `RequestContext`. Cache adapters use it to
//! abandon outstanding store operations when the enclosing request goes away;
//! entries are written whole or not at all, so no cleanup is needed.

use crate::{ErrorEnvelope, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation identifier attached to logs and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

impl CorrelationId {
    /// Allocate a process-unique `req_<n>` identifier.
    #[must_use]
    pub fn next_request_id() -> Self {
        let sequence = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(Arc::from(format!("req_{sequence}")))
    }

    /// Borrow the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Clonable cancellation handle shared between a request and its tasks.
pub type CancellationToken = tokio_util::sync::CancellationToken;

/// Context passed to every port and use case.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Context with a fresh cancellation token.
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Context with an auto-generated `req_*` id.
    #[must_use]
    pub fn new_request() -> Self {
        Self::new(CorrelationId::next_request_id())
    }

    /// Derive a context whose cancellation follows this one.
    ///
    /// Cancelling the child does not cancel the parent.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Correlation id for this request.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Returns true once the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel this request and every child context.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Resolves when the request is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Fail with `core:cancelled` when the request was cancelled.
    pub fn ensure_not_cancelled(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(ErrorEnvelope::cancelled("operation cancelled")
                .with_metadata("operation", operation));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let first = CorrelationId::next_request_id();
        let second = CorrelationId::next_request_id();
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("req_"));
    }

    #[test]
    fn child_follows_parent_cancellation() {
        let parent = RequestContext::new_request();
        let child = parent.child();
        assert_eq!(child.correlation_id(), parent.correlation_id());

        child.cancel();
        assert!(!parent.is_cancelled());

        let second = parent.child();
        parent.cancel();
        assert!(second.is_cancelled());
        assert!(second.ensure_not_cancelled("lookup").is_err());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let ctx = RequestContext::new_request();
        let waiter = ctx.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        ctx.cancel();
        assert!(task.await.is_ok());
    }
}
