//! Store double for unit tests.

use docrag_domain::{CacheKey, CacheLayer, CacheStatistics, StoreBackend};
use docrag_ports::{BoxFuture, CacheStorePort, ClearScope};
use docrag_shared::RequestContext;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Map-backed store counting every call. Ignores expiry except TTL zero.
#[derive(Default)]
pub struct RecordingStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicU64,
}

impl RecordingStore {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn entries(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    pub fn layer_entries(&self, layer: CacheLayer) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.keys().filter(|key| layer.owns_key(key)).count())
            .unwrap_or_default()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

impl CacheStorePort for RecordingStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    fn get(&self, _ctx: &RequestContext, key: CacheKey) -> BoxFuture<'_, Option<Vec<u8>>> {
        self.touch();
        let value = self
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key.as_str()).cloned());
        Box::pin(async move { value })
    }

    fn set(
        &self,
        _ctx: &RequestContext,
        key: CacheKey,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'_, bool> {
        self.touch();
        let stored = self.entries.lock().is_ok_and(|mut entries| {
            if ttl.is_zero() {
                entries.remove(key.as_str());
                false
            } else {
                entries.insert(key.as_str().to_owned(), value);
                true
            }
        });
        Box::pin(async move { stored })
    }

    fn delete(&self, _ctx: &RequestContext, key: CacheKey) -> BoxFuture<'_, bool> {
        self.touch();
        let removed = self
            .entries
            .lock()
            .is_ok_and(|mut entries| entries.remove(key.as_str()).is_some());
        Box::pin(async move { removed })
    }

    fn clear(&self, _ctx: &RequestContext, scope: ClearScope) -> BoxFuture<'_, u64> {
        self.touch();
        let layers = scope.layers();
        let removed = self.entries.lock().map_or(0, |mut entries| {
            let before = entries.len();
            entries.retain(|key, _| !layers.iter().any(|layer| layer.owns_key(key)));
            (before - entries.len()) as u64
        });
        Box::pin(async move { removed })
    }

    fn stats(&self, _ctx: &RequestContext) -> BoxFuture<'_, CacheStatistics> {
        self.touch();
        Box::pin(async { CacheStatistics::connected(StoreBackend::Memory, 0, 0) })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}
