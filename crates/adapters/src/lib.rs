//! # docrag-adapters
//!
//! Adapter implementations for the docrag ports: cache stores (Redis,
//! in-memory, no-op) behind a fail-soft wrapper, the caching embedding
//! decorator, JSON and `tracing` loggers, telemetry, and local providers.
//! Depends on `ports`, `domain` and `shared`; never on `app` or `infra`.

pub mod cache;
pub mod local;
pub mod log_sink;
pub mod logger;
pub mod store;
pub mod telemetry;
pub mod tracing_logger;

pub use cache::CachingEmbedding;
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::JsonLogger;
pub use store::{
    FailSoftStore, FallibleStore, MemoryStore, NoopStore, RedisStore, RedisStoreConfig,
};
pub use telemetry::{InMemoryTelemetry, JsonTelemetry, TaggedTelemetry};
pub use tracing_logger::TracingLogger;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
