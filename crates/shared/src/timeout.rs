//! Bounded awaits that also honour request cancellation.

use crate::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::Duration;

/// Await `fut` for at most `timeout`, failing early when `ctx` is cancelled.
///
/// A timeout yields a retriable `core:timeout` error tagged with `operation`.
pub async fn timeout_with_context<T, F>(
    ctx: &RequestContext,
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ctx.ensure_not_cancelled(operation)?;

    tokio::select! {
        () = ctx.cancelled() => Err(
            ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
        ),
        outcome = tokio::time::timeout(timeout, fut) => match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(ErrorEnvelope::unexpected(
                ErrorCode::timeout(),
                format!("{operation} timed out after {}ms", timeout.as_millis()),
                ErrorClass::Retriable,
            )
            .with_metadata("operation", operation)),
        },
    }
}
