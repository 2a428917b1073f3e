//! # docrag-shared
//!
//! Foundational types used by every crate in the docrag-cache workspace:
//!
//! - Error envelope and the workspace `Result` alias
//! - Request context with correlation ids and cancellation
//! - Cancellation-aware timeouts for store and provider calls
//! - Secret redaction for logs, errors and connection strings
//!
//! ## Design Principles
//!
//! 1. **No workspace dependencies** - This crate only depends on external crates
//! 2. **Serde-compatible** - Error types serialize for CLI and log output

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod concurrency;
pub mod errors;
pub mod redaction;
pub mod result;
pub mod timeout;

pub use concurrency::{CancellationToken, CorrelationId, RequestContext};
pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata};
pub use redaction::{
    REDACTED, SecretString, is_secret_key, redact_if_secret, redact_url_credentials,
};
pub use result::Result;
pub use timeout::timeout_with_context;

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
