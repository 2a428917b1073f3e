// Allow missing docs in integration test.
#![allow(missing_docs, reason = "integration test")]

use docrag_adapters::{
    CachingEmbedding, FailSoftStore, FallibleStore, JsonLogger, MemoryLogSink, MemoryStore,
};
use docrag_domain::{CacheKey, CacheLayer, CacheStatistics, StoreBackend};
use docrag_ports::{
    BoxFuture, CacheStorePort, EmbedBatchRequest, EmbedRequest, EmbeddingPort,
    EmbeddingProviderInfo, EmbeddingVector, LogLevel,
};
use docrag_shared::{ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

struct CountingEmbedding {
    info: EmbeddingProviderInfo,
    calls: AtomicU32,
}

impl CountingEmbedding {
    fn new() -> Self {
        Self {
            info: EmbeddingProviderInfo {
                name: "counting".into(),
                model: "mini".into(),
            },
            calls: AtomicU32::new(0),
        }
    }

    fn vector(text: &str) -> EmbeddingVector {
        EmbeddingVector::from_vec(text.bytes().map(f32::from).take(4).collect())
    }
}

impl EmbeddingPort for CountingEmbedding {
    fn provider(&self) -> &EmbeddingProviderInfo {
        &self.info
    }

    fn embed(
        &self,
        _ctx: &RequestContext,
        request: EmbedRequest,
    ) -> BoxFuture<'_, Result<EmbeddingVector>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(Self::vector(&request.text))
        })
    }

    fn embed_batch(
        &self,
        _ctx: &RequestContext,
        request: EmbedBatchRequest,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(request.texts.iter().map(|text| Self::vector(text)).collect())
        })
    }
}

/// Backend that never answers.
struct StalledBackend;

impl FallibleStore for StalledBackend {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Redis
    }

    fn get(&self, _key: CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        Box::pin(std::future::pending())
    }

    fn set(&self, _key: CacheKey, _value: Vec<u8>, _ttl: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(std::future::pending())
    }

    fn delete(&self, _key: CacheKey) -> BoxFuture<'_, Result<bool>> {
        Box::pin(std::future::pending())
    }

    fn clear_layers(&self, _layers: Vec<CacheLayer>) -> BoxFuture<'_, Result<u64>> {
        Box::pin(std::future::pending())
    }

    fn stats(&self) -> BoxFuture<'_, Result<CacheStatistics>> {
        Box::pin(async {
            Err(ErrorEnvelope::backend_unavailable("connection refused"))
        })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[tokio::test]
async fn stalled_store_degrades_to_provider_calls() -> Result<()> {
    let sink = Arc::new(MemoryLogSink::default());
    let logger = Arc::new(JsonLogger::new(sink.clone()).with_min_level(LogLevel::Warn));
    let store: Arc<dyn CacheStorePort> = Arc::new(
        FailSoftStore::new(Arc::new(StalledBackend), Duration::from_millis(20)).with_logger(logger),
    );
    let provider = Arc::new(CountingEmbedding::new());
    let caching = CachingEmbedding::new(provider.clone(), Arc::clone(&store), Duration::from_secs(60));
    let ctx = RequestContext::new_request();

    let first = caching.embed(&ctx, "hello".into()).await?;
    let second = caching.embed(&ctx, "hello".into()).await?;

    assert_eq!(first, second);
    assert_eq!(first, CountingEmbedding::vector("hello"));
    assert_eq!(provider.calls.load(Ordering::Relaxed), 2);

    let events: Vec<String> = sink
        .take()
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim_end()).ok())
        .filter_map(|payload| payload["event"].as_str().map(str::to_owned))
        .collect();
    assert!(events.iter().any(|event| event == "cache.store.get_failed"));
    assert!(events.iter().any(|event| event == "cache.store.set_failed"));

    let stats = store.stats(&ctx).await;
    assert!(!stats.is_connected());
    assert_eq!(stats.backend, StoreBackend::Redis);
    Ok(())
}

#[tokio::test]
async fn results_match_with_and_without_a_working_store() -> Result<()> {
    let texts = ["alpha", "beta", "alpha", "gamma"];
    let ctx = RequestContext::new_request();

    let stalled: Arc<dyn CacheStorePort> = Arc::new(FailSoftStore::new(
        Arc::new(StalledBackend),
        Duration::from_millis(10),
    ));
    let working: Arc<dyn CacheStorePort> = Arc::new(FailSoftStore::new(
        Arc::new(MemoryStore::new(32, 1 << 16)?),
        Duration::from_secs(1),
    ));

    let degraded = CachingEmbedding::new(Arc::new(CountingEmbedding::new()), stalled, Duration::from_secs(60))
        .embed_batch(&ctx, EmbedBatchRequest::from(&texts[..]))
        .await?;

    let cached = CachingEmbedding::new(Arc::new(CountingEmbedding::new()), working, Duration::from_secs(60));
    let cold = cached.embed_batch(&ctx, EmbedBatchRequest::from(&texts[..])).await?;
    let warm = cached.embed_batch(&ctx, EmbedBatchRequest::from(&texts[..])).await?;

    assert_eq!(degraded, cold);
    assert_eq!(cold, warm);
    Ok(())
}
