//! Cache store boundary contract.
//!
//! The store is the one component every cached path depends on, so its
//! contract is infallible at the type level: a store that cannot reach its
//! backend answers `None`, `false` or `0` and logs, it never returns an error.
//! Losing the cache costs latency, never correctness.

use crate::BoxFuture;
use docrag_domain::{CacheKey, CacheLayer, CacheStatistics, StoreBackend};
use docrag_shared::{ErrorEnvelope, RequestContext, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

/// What a `clear` call removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    /// Every key of every layer.
    All,
    /// Only keys of one layer.
    Layer(CacheLayer),
}

impl ClearScope {
    /// Layers covered by this scope.
    #[must_use]
    pub fn layers(self) -> Vec<CacheLayer> {
        match self {
            Self::All => CacheLayer::ALL.to_vec(),
            Self::Layer(layer) => vec![layer],
        }
    }
}

impl fmt::Display for ClearScope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => formatter.write_str("all"),
            Self::Layer(layer) => write!(formatter, "{layer}"),
        }
    }
}

/// Fail-soft key-value store with per-key expiry.
pub trait CacheStorePort: Send + Sync {
    /// Which implementation backs this store.
    fn backend(&self) -> StoreBackend;

    /// Fetch a payload. Missing, expired and unreachable all read as `None`.
    fn get(&self, ctx: &RequestContext, key: CacheKey) -> BoxFuture<'_, Option<Vec<u8>>>;

    /// Store a payload for `ttl`. A zero TTL removes the key instead.
    ///
    /// Returns false when the write was dropped.
    fn set(
        &self,
        ctx: &RequestContext,
        key: CacheKey,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'_, bool>;

    /// Remove one key. Returns true when a key was removed.
    fn delete(&self, ctx: &RequestContext, key: CacheKey) -> BoxFuture<'_, bool>;

    /// Remove every key in `scope`, returning how many went away.
    fn clear(&self, ctx: &RequestContext, scope: ClearScope) -> BoxFuture<'_, u64>;

    /// Current statistics; `disconnected` when the backend is unreachable.
    fn stats(&self, ctx: &RequestContext) -> BoxFuture<'_, CacheStatistics>;

    /// Release connections. Later calls may reconnect.
    fn shutdown(&self) -> BoxFuture<'_, ()>;
}

/// Encode a payload for storage.
pub fn encode_payload<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|error| ErrorEnvelope::serialization(format!("encode failed: {error}")))
}

/// Decode a stored payload.
///
/// Callers treat a failure as a cache miss and overwrite the entry.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|error| ErrorEnvelope::serialization(format!("decode failed: {error}")))
}
