use docrag_domain::{CacheKey, CacheStatistics, StoreBackend};
use docrag_ports::{BoxFuture, CacheStorePort, ClearScope};
use docrag_shared::RequestContext;
use std::time::Duration;

/// Store that holds nothing. Every lookup misses and every write is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl CacheStorePort for NoopStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::None
    }

    fn get(&self, _ctx: &RequestContext, _key: CacheKey) -> BoxFuture<'_, Option<Vec<u8>>> {
        Box::pin(async { None })
    }

    fn set(
        &self,
        _ctx: &RequestContext,
        _key: CacheKey,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> BoxFuture<'_, bool> {
        Box::pin(async { false })
    }

    fn delete(&self, _ctx: &RequestContext, _key: CacheKey) -> BoxFuture<'_, bool> {
        Box::pin(async { false })
    }

    fn clear(&self, _ctx: &RequestContext, _scope: ClearScope) -> BoxFuture<'_, u64> {
        Box::pin(async { 0 })
    }

    fn stats(&self, _ctx: &RequestContext) -> BoxFuture<'_, CacheStatistics> {
        Box::pin(async { CacheStatistics::disabled() })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_domain::{CacheLayer, StoreStatus, SimilarityFingerprint, derive_key};
    use docrag_shared::Result;

    #[tokio::test]
    async fn noop_store_never_holds_values() -> Result<()> {
        let store = NoopStore;
        let ctx = RequestContext::new_request();
        let key = derive_key(
            CacheLayer::Similarity,
            &SimilarityFingerprint::new("q", None, 3)?,
        );
        assert!(!store.set(&ctx, key.clone(), b"v".to_vec(), Duration::from_secs(1)).await);
        assert_eq!(store.get(&ctx, key).await, None);
        let stats = store.stats(&ctx).await;
        assert_eq!(stats.status, StoreStatus::Disabled);
        assert_eq!(stats.hit_rate.as_ref(), "0.0%");
        Ok(())
    }
}
