use super::FallibleStore;
use docrag_domain::{CacheKey, CacheLayer, CacheStatistics, StoreBackend, format_bytes_human};
use docrag_ports::BoxFuture;
use docrag_shared::{ErrorCode, ErrorEnvelope, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-local store with per-entry expiry and LRU eviction.
///
/// Entries are evicted oldest-first once either `max_entries` or `max_bytes`
/// is exceeded. Expired entries are dropped lazily on read.
#[derive(Debug)]
pub struct MemoryStore {
    max_entries: usize,
    max_bytes: u64,
    state: tokio::sync::Mutex<StoreState>,
    hits: AtomicU64,
    misses: AtomicU64,
    commands: AtomicU64,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<Box<str>, StoreEntry>,
    order: VecDeque<Box<str>>,
    total_bytes: u64,
}

#[derive(Debug, Clone)]
struct StoreEntry {
    value: Vec<u8>,
    expires_at: Instant,
    size_bytes: u64,
}

impl MemoryStore {
    /// Create a store bounded by entry count and payload bytes.
    pub fn new(max_entries: usize, max_bytes: u64) -> Result<Self> {
        if max_entries == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "memory store max_entries must be greater than zero",
            ));
        }
        if max_bytes == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "memory store max_bytes must be greater than zero",
            ));
        }
        Ok(Self {
            max_entries,
            max_bytes,
            state: tokio::sync::Mutex::new(StoreState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            commands: AtomicU64::new(0),
        })
    }

    /// Number of live (possibly expired, not yet collected) entries.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Returns true when the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn estimate_size(key: &str, value: &[u8]) -> u64 {
        (key.len() as u64).saturating_add(value.len() as u64)
    }

    fn count_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    async fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock().await;
        let entry = state.entries.get(key)?.clone();
        if entry.expires_at <= Instant::now() {
            Self::remove(&mut state, key);
            return None;
        }
        Self::touch(&mut state, key);
        drop(state);
        Some(entry.value)
    }

    async fn insert(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now + Duration::from_secs(31_536_000));
        let size = Self::estimate_size(key, &value);

        let mut state = self.state.lock().await;
        if let Some(existing) = state.entries.insert(
            key.into(),
            StoreEntry {
                value,
                expires_at,
                size_bytes: size,
            },
        ) {
            state.total_bytes = state.total_bytes.saturating_sub(existing.size_bytes);
        }
        state.total_bytes = state.total_bytes.saturating_add(size);
        Self::touch(&mut state, key);
        Self::evict(&mut state, self.max_entries, self.max_bytes);
        drop(state);
    }

    fn remove(state: &mut StoreState, key: &str) -> bool {
        let Some(entry) = state.entries.remove(key) else {
            return false;
        };
        state.total_bytes = state.total_bytes.saturating_sub(entry.size_bytes);
        if let Some(pos) = state.order.iter().position(|k| k.as_ref() == key) {
            state.order.remove(pos);
        }
        true
    }

    fn touch(state: &mut StoreState, key: &str) {
        if let Some(pos) = state.order.iter().position(|k| k.as_ref() == key) {
            state.order.remove(pos);
        }
        state.order.push_back(key.into());
    }

    fn evict(state: &mut StoreState, max_entries: usize, max_bytes: u64) {
        while state.entries.len() > max_entries || state.total_bytes > max_bytes {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            if let Some(entry) = state.entries.remove(&oldest) {
                state.total_bytes = state.total_bytes.saturating_sub(entry.size_bytes);
            }
        }
    }
}

impl FallibleStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    fn get(&self, key: CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        Box::pin(async move {
            self.count_command();
            let value = self.lookup(key.as_str()).await;
            let counter = if value.is_some() { &self.hits } else { &self.misses };
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(value)
        })
    }

    fn set(&self, key: CacheKey, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.count_command();
            if ttl.is_zero() {
                let mut state = self.state.lock().await;
                Self::remove(&mut state, key.as_str());
                return Ok(());
            }
            self.insert(key.as_str(), value, ttl).await;
            Ok(())
        })
    }

    fn delete(&self, key: CacheKey) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            self.count_command();
            let mut state = self.state.lock().await;
            Ok(Self::remove(&mut state, key.as_str()))
        })
    }

    fn clear_layers(&self, layers: Vec<CacheLayer>) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            self.count_command();
            let mut state = self.state.lock().await;
            let doomed: Vec<Box<str>> = state
                .entries
                .keys()
                .filter(|key| layers.iter().any(|layer| layer.owns_key(key)))
                .cloned()
                .collect();
            let mut removed = 0u64;
            for key in doomed {
                if Self::remove(&mut state, &key) {
                    removed += 1;
                }
            }
            drop(state);
            Ok(removed)
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<CacheStatistics>> {
        Box::pin(async move {
            let used = self.state.lock().await.total_bytes;
            Ok(CacheStatistics::connected(
                StoreBackend::Memory,
                self.hits.load(Ordering::Relaxed),
                self.misses.load(Ordering::Relaxed),
            )
            .with_used_memory(format_bytes_human(used))
            .with_connected_clients(1)
            .with_total_commands(self.commands.load(Ordering::Relaxed)))
        })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_domain::{EmbeddingFingerprint, QueryFingerprint, SimilarityFingerprint, derive_key};

    fn key(layer: CacheLayer, text: &str) -> Result<CacheKey> {
        Ok(match layer {
            CacheLayer::Embedding => derive_key(layer, &EmbeddingFingerprint::new(text, "m")?),
            CacheLayer::Similarity => {
                derive_key(layer, &SimilarityFingerprint::new(text, None, 5)?)
            },
            CacheLayer::Query => derive_key(layer, &QueryFingerprint::new(text, None, 5)?),
        })
    }

    #[tokio::test]
    async fn round_trip_and_hit_counting() -> Result<()> {
        let store = MemoryStore::new(8, 4096)?;
        let k = key(CacheLayer::Query, "q")?;
        assert_eq!(store.get(k.clone()).await?, None);
        store.set(k.clone(), b"answer".to_vec(), Duration::from_secs(60)).await?;
        assert_eq!(store.get(k).await?, Some(b"answer".to_vec()));

        let stats = store.stats().await?;
        assert_eq!(stats.keyspace_hits, 1);
        assert_eq!(stats.keyspace_misses, 1);
        assert_eq!(stats.hit_rate.as_ref(), "50.0%");
        Ok(())
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() -> Result<()> {
        let store = MemoryStore::new(8, 4096)?;
        let k = key(CacheLayer::Embedding, "short-lived")?;
        store.set(k.clone(), b"v".to_vec(), Duration::from_millis(5)).await?;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get(k).await?, None);
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn eviction_by_entries_drops_least_recent() -> Result<()> {
        let store = MemoryStore::new(2, 1 << 20)?;
        let a = key(CacheLayer::Query, "a")?;
        let b = key(CacheLayer::Query, "b")?;
        let c = key(CacheLayer::Query, "c")?;
        let ttl = Duration::from_secs(60);

        store.set(a.clone(), b"1".to_vec(), ttl).await?;
        store.set(b.clone(), b"2".to_vec(), ttl).await?;
        assert!(store.get(a.clone()).await?.is_some());
        store.set(c.clone(), b"3".to_vec(), ttl).await?;

        assert!(store.get(a).await?.is_some());
        assert!(store.get(b).await?.is_none());
        assert!(store.get(c).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn eviction_by_bytes() -> Result<()> {
        let store = MemoryStore::new(100, 200)?;
        let ttl = Duration::from_secs(60);
        let first = key(CacheLayer::Query, "first")?;
        store.set(first.clone(), vec![0u8; 100], ttl).await?;
        store.set(key(CacheLayer::Query, "second")?, vec![0u8; 100], ttl).await?;
        assert!(store.get(first).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn clear_layers_is_scoped() -> Result<()> {
        let store = MemoryStore::new(16, 1 << 20)?;
        let ttl = Duration::from_secs(60);
        for layer in CacheLayer::ALL {
            store.set(key(layer, "x")?, b"v".to_vec(), ttl).await?;
        }

        assert_eq!(store.clear_layers(vec![CacheLayer::Query]).await?, 1);
        assert!(store.get(key(CacheLayer::Embedding, "x")?).await?.is_some());
        assert!(store.get(key(CacheLayer::Similarity, "x")?).await?.is_some());
        assert!(store.get(key(CacheLayer::Query, "x")?).await?.is_none());

        assert_eq!(store.clear_layers(CacheLayer::ALL.to_vec()).await?, 2);
        assert!(store.is_empty().await);
        Ok(())
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(MemoryStore::new(0, 10).is_err());
        assert!(MemoryStore::new(10, 0).is_err());
    }
}
