//! Cache store adapters.
//!
//! Backends implement [`FallibleStore`] and report every failure. The
//! [`FailSoftStore`] wrapper turns them into a [`CacheStorePort`]: it bounds
//! each call with a timeout, absorbs errors into neutral results and logs
//! them. [`NoopStore`] implements the port directly for disabled caching.
//!
//! [`CacheStorePort`]: docrag_ports::CacheStorePort

mod failsoft;
mod memory;
mod noop;
mod redis;

pub use failsoft::FailSoftStore;
pub use memory::MemoryStore;
pub use noop::NoopStore;
pub use redis::{RedisStore, RedisStoreConfig, parse_redis_info};

use docrag_domain::{CacheKey, CacheLayer, CacheStatistics, StoreBackend};
use docrag_ports::BoxFuture;
use docrag_shared::Result;
use std::time::Duration;

/// Store backend that reports failures instead of hiding them.
pub trait FallibleStore: Send + Sync {
    /// Which implementation this is.
    fn backend(&self) -> StoreBackend;

    /// Fetch a payload; `Ok(None)` when absent or expired.
    fn get(&self, key: CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>>>;

    /// Store a payload with a positive TTL.
    fn set(&self, key: CacheKey, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, Result<()>>;

    /// Remove a key; `Ok(true)` when it existed.
    fn delete(&self, key: CacheKey) -> BoxFuture<'_, Result<bool>>;

    /// Remove every key owned by `layers`, returning the count.
    fn clear_layers(&self, layers: Vec<CacheLayer>) -> BoxFuture<'_, Result<u64>>;

    /// Statistics snapshot.
    fn stats(&self) -> BoxFuture<'_, Result<CacheStatistics>>;

    /// Drop open connections.
    fn shutdown(&self) -> BoxFuture<'_, ()>;
}
