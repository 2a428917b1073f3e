//! Cache statistics snapshots.
//!
//! Snapshots are derived on demand from the store's own counters; nothing
//! here is persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state reported by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    /// The store answered the stats request.
    Connected,
    /// The store could not be reached.
    Disconnected,
    /// Caching is switched off; the no-op store is active.
    Disabled,
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Disabled => "disabled",
        })
    }
}

/// Which store implementation produced the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared Redis server.
    Redis,
    /// Process-local TTL/LRU store.
    Memory,
    /// No store at all.
    None,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
            Self::None => "none",
        })
    }
}

/// Point-in-time statistics for the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatistics {
    /// Connection state.
    pub status: StoreStatus,
    /// Store implementation.
    pub backend: StoreBackend,
    /// Memory in use, human readable (`"1.02M"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_memory: Option<Box<str>>,
    /// Clients connected to the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_clients: Option<u64>,
    /// Commands processed since the store started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_commands_processed: Option<u64>,
    /// Cumulative lookup hits.
    pub keyspace_hits: u64,
    /// Cumulative lookup misses.
    pub keyspace_misses: u64,
    /// `hits / (hits + misses)` as a percentage with one decimal.
    pub hit_rate: Box<str>,
    /// Failure detail when the store could not report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Box<str>>,
}

impl CacheStatistics {
    /// Snapshot for a reachable store.
    #[must_use]
    pub fn connected(backend: StoreBackend, hits: u64, misses: u64) -> Self {
        Self {
            status: StoreStatus::Connected,
            backend,
            used_memory: None,
            connected_clients: None,
            total_commands_processed: None,
            keyspace_hits: hits,
            keyspace_misses: misses,
            hit_rate: format_hit_rate(hits, misses).into_boxed_str(),
            error: None,
        }
    }

    /// Snapshot for an unreachable store.
    #[must_use]
    pub fn disconnected(backend: StoreBackend, error: Option<&str>) -> Self {
        Self {
            status: StoreStatus::Disconnected,
            error: error.map(Into::into),
            ..Self::connected(backend, 0, 0)
        }
    }

    /// Snapshot for the no-op store.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            status: StoreStatus::Disabled,
            ..Self::connected(StoreBackend::None, 0, 0)
        }
    }

    /// Attach memory usage.
    #[must_use]
    pub fn with_used_memory(mut self, used_memory: impl Into<Box<str>>) -> Self {
        self.used_memory = Some(used_memory.into());
        self
    }

    /// Attach the client count.
    #[must_use]
    pub const fn with_connected_clients(mut self, clients: u64) -> Self {
        self.connected_clients = Some(clients);
        self
    }

    /// Attach the processed command count.
    #[must_use]
    pub const fn with_total_commands(mut self, commands: u64) -> Self {
        self.total_commands_processed = Some(commands);
        self
    }

    /// Hit ratio in `0.0..=1.0`; zero when no lookups were recorded.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        hit_ratio(self.keyspace_hits, self.keyspace_misses)
    }

    /// Returns true when the store is reachable.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == StoreStatus::Connected
    }
}

fn hit_ratio(hits: u64, misses: u64) -> f64 {
    let total = hits.saturating_add(misses);
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64
}

/// Render a hit rate as `"66.7%"`; `"0.0%"` when there were no lookups.
#[must_use]
pub fn format_hit_rate(hits: u64, misses: u64) -> String {
    format!("{:.1}%", hit_ratio(hits, misses) * 100.0)
}

/// Render a byte count the way Redis renders `used_memory_human`.
#[must_use]
pub fn format_bytes_human(bytes: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1 << 30, "G"), (1 << 20, "M"), (1 << 10, "K")];
    for (size, suffix) in UNITS {
        if bytes >= size {
            return format!("{:.2}{suffix}", bytes as f64 / size as f64);
        }
    }
    format!("{bytes}B")
}
