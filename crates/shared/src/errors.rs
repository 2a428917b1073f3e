//! Error envelope shared by every crate in the workspace.
//!
//! Errors carry a stable namespaced code (`cache:backend_unavailable`), a
//! kind describing where the failure came from, and a retry class. Adapters
//! attach string metadata for diagnostics; secrets never go into metadata
//! unredacted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, io};

/// Metadata attached to errors for diagnostics.
pub type ErrorMetadata = BTreeMap<String, String>;

/// Origin category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Caller-side problems: bad input, invalid fingerprints, cancellation.
    Expected,
    /// A contract inside the workspace was broken.
    Invariant,
    /// I/O and collaborator failures.
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Expected => "expected",
            Self::Invariant => "invariant",
            Self::Unexpected => "unexpected",
        };
        formatter.write_str(label)
    }
}

/// Whether retrying the failed operation may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    /// Transient; a later attempt may succeed.
    Retriable,
    /// Permanent for the given input.
    NonRetriable,
}

impl ErrorClass {
    /// Returns true when the error is considered retriable.
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Retriable)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Retriable => "retriable",
            Self::NonRetriable => "non-retriable",
        };
        formatter.write_str(label)
    }
}

/// Stable `namespace:code` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    namespace: String,
    code: String,
}

impl ErrorCode {
    /// Create a new error code with a namespace and code.
    pub fn new(namespace: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            code: code.into(),
        }
    }

    /// `core:cancelled`
    pub fn cancelled() -> Self {
        Self::new("core", "cancelled")
    }

    /// `core:invalid_input`
    pub fn invalid_input() -> Self {
        Self::new("core", "invalid_input")
    }

    /// `core:timeout`
    pub fn timeout() -> Self {
        Self::new("core", "timeout")
    }

    /// `core:io`
    pub fn io() -> Self {
        Self::new("core", "io")
    }

    /// `core:internal`
    pub fn internal() -> Self {
        Self::new("core", "internal")
    }

    /// `cache:backend_unavailable`: the backing store could not be reached.
    pub fn backend_unavailable() -> Self {
        Self::new("cache", "backend_unavailable")
    }

    /// `cache:serialization`: a payload could not be encoded or decoded.
    pub fn serialization() -> Self {
        Self::new("cache", "serialization")
    }

    /// `cache:invalid_fingerprint`: not enough fields to derive a key.
    pub fn invalid_fingerprint() -> Self {
        Self::new("cache", "invalid_fingerprint")
    }

    /// Returns the namespace portion.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the code identifier.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.namespace, self.code)
    }
}

/// Structured error passed across crate boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Origin category.
    pub kind: ErrorKind,
    /// Retry classification.
    pub class: ErrorClass,
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message. Never contains credentials.
    pub message: String,
    /// Additional diagnostic metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: ErrorMetadata,
}

impl ErrorEnvelope {
    fn build(kind: ErrorKind, class: ErrorClass, code: ErrorCode, message: String) -> Self {
        Self {
            kind,
            class,
            code,
            message,
            metadata: ErrorMetadata::new(),
        }
    }

    /// Expected, non-retriable error.
    pub fn expected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::build(
            ErrorKind::Expected,
            ErrorClass::NonRetriable,
            code,
            message.into(),
        )
    }

    /// Invariant violation (never retriable).
    pub fn invariant(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::build(
            ErrorKind::Invariant,
            ErrorClass::NonRetriable,
            code,
            message.into(),
        )
    }

    /// Unexpected error with an explicit retry class.
    pub fn unexpected(code: ErrorCode, message: impl Into<String>, class: ErrorClass) -> Self {
        Self::build(ErrorKind::Unexpected, class, code, message.into())
    }

    /// The cache backend is unreachable or timed out.
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::unexpected(
            ErrorCode::backend_unavailable(),
            message,
            ErrorClass::Retriable,
        )
    }

    /// A cached payload could not be encoded or decoded.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::unexpected(ErrorCode::serialization(), message, ErrorClass::NonRetriable)
    }

    /// The caller supplied an incomplete fingerprint.
    pub fn invalid_fingerprint(message: impl Into<String>) -> Self {
        Self::expected(ErrorCode::invalid_fingerprint(), message)
    }

    /// The surrounding request was cancelled.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::expected(ErrorCode::cancelled(), message)
    }

    /// Returns true if the error represents a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::cancelled()
    }

    /// Returns true for failures owned by the cache backend.
    ///
    /// These are absorbed by the store adapters and never reach callers.
    #[must_use]
    pub fn is_cache_backend_failure(&self) -> bool {
        self.code == ErrorCode::backend_unavailable()
            || self.code == ErrorCode::serialization()
            || self.code == ErrorCode::timeout()
    }

    /// Attach a single metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} {} {}: {}",
            self.kind, self.class, self.code, self.message
        )
    }
}

impl std::error::Error for ErrorEnvelope {}

impl From<io::Error> for ErrorEnvelope {
    fn from(error: io::Error) -> Self {
        let (code, class) = match error.kind() {
            io::ErrorKind::TimedOut => (ErrorCode::timeout(), ErrorClass::Retriable),
            io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => (ErrorCode::io(), ErrorClass::Retriable),
            _ => (ErrorCode::io(), ErrorClass::NonRetriable),
        };
        Self::unexpected(code, error.to_string(), class)
    }
}
