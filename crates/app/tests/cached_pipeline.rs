// Allow missing docs in integration test.
#![allow(missing_docs, reason = "integration test")]

use docrag_adapters::local::{CorpusChunk, ExtractiveAnswerGenerator, HashEmbedding, LocalCorpusIndex};
use docrag_adapters::{
    CachingEmbedding, FailSoftStore, FallibleStore, InMemoryTelemetry, MemoryStore,
};
use docrag_app::{
    AnswerQueryDeps, CacheAdmin, CachePolicy, CachedSimilaritySearch, PipelineSettings,
    QueryRequest, ResultCache, answer_query,
};
use docrag_domain::{CacheKey, CacheLayer, CacheStatistics, QueryAnswer, StoreBackend};
use docrag_ports::{
    AnswerGenerationPort, BoxFuture, CacheStorePort, ClearScope, EmbeddingPort, GenerateRequest,
};
use docrag_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

fn corpus() -> Vec<CorpusChunk> {
    [
        ("Artificial intelligence (AI) is intelligence demonstrated by machines.", "ai"),
        ("AI research studies intelligent agents that perceive their environment.", "ai"),
        ("A sourdough starter is a fermented mix of flour and water.", "bread"),
    ]
    .into_iter()
    .map(|(content, doc)| CorpusChunk {
        content: content.into(),
        document_id: Some(doc.into()),
        metadata: BTreeMap::new(),
    })
    .collect()
}

struct Harness {
    embedder: Arc<HashEmbedding>,
    index: Arc<LocalCorpusIndex>,
    generator: Arc<ExtractiveAnswerGenerator>,
    telemetry: Arc<InMemoryTelemetry>,
    deps: AnswerQueryDeps,
}

impl Harness {
    /// Pipeline over `store`; `policy` decides which layers cache.
    async fn new(store: Arc<dyn CacheStorePort>, policy: CachePolicy) -> Result<Self> {
        let embedder = Arc::new(HashEmbedding::new("hash-mini", 128)?);
        let index = Arc::new(LocalCorpusIndex::new());
        index
            .ingest(&RequestContext::new_request(), embedder.as_ref(), corpus())
            .await?;
        let generator = Arc::new(ExtractiveAnswerGenerator::new());
        let telemetry = Arc::new(InMemoryTelemetry::default());

        let query_embedder: Arc<dyn EmbeddingPort> = if policy.embedding.enabled {
            Arc::new(
                CachingEmbedding::new(embedder.clone(), Arc::clone(&store), policy.embedding.ttl)
                    .with_telemetry(telemetry.clone()),
            )
        } else {
            embedder.clone()
        };
        let cache = ResultCache::new(store, policy).with_telemetry(telemetry.clone());
        let deps = AnswerQueryDeps {
            similarity: CachedSimilaritySearch::new(query_embedder, index.clone(), cache.clone()),
            generator: generator.clone(),
            cache,
            settings: PipelineSettings::default(),
            logger: None,
            telemetry: Some(telemetry.clone()),
        };
        Ok(Self {
            embedder,
            index,
            generator,
            telemetry,
            deps,
        })
    }

    fn provider_calls(&self) -> (u64, u64, u64) {
        (
            self.embedder.calls(),
            self.index.searches(),
            self.generator.calls(),
        )
    }

    async fn ask(&self, question: &str) -> Result<QueryAnswer> {
        answer_query(&RequestContext::new_request(), &self.deps, QueryRequest::new(question)).await
    }
}

fn memory_store() -> Result<(Arc<MemoryStore>, Arc<dyn CacheStorePort>)> {
    let memory = Arc::new(MemoryStore::new(1_000, 1 << 20)?);
    let store: Arc<dyn CacheStorePort> =
        Arc::new(FailSoftStore::new(memory.clone(), Duration::from_secs(1)));
    Ok((memory, store))
}

#[tokio::test]
async fn first_query_fills_three_layers_and_second_is_free() -> Result<()> {
    let (memory, store) = memory_store()?;
    let harness = Harness::new(store, CachePolicy::default()).await?;
    let after_ingest = harness.provider_calls();

    let first = harness.ask("What is AI?").await?;
    assert_eq!(memory.len().await, 3);
    assert!(first.context.contains("Artificial intelligence"));
    let after_first = harness.provider_calls();
    assert_eq!(after_first.0, after_ingest.0 + 1);
    assert_eq!(after_first.1, after_ingest.1 + 1);
    assert_eq!(after_first.2, 1);

    let second = harness.ask("What is AI?").await?;
    assert_eq!(second, first);
    assert_eq!(harness.provider_calls(), after_first);
    assert_eq!(harness.telemetry.layer_counter("cache.hit", "query"), 1);
    assert_eq!(harness.telemetry.layer_counter("cache.miss", "query"), 1);
    Ok(())
}

#[tokio::test]
async fn query_invalidation_reuses_cached_similarity_hits() -> Result<()> {
    let (memory, store) = memory_store()?;
    let harness = Harness::new(Arc::clone(&store), CachePolicy::default()).await?;
    let admin = CacheAdmin::new(store);

    harness.ask("What is AI?").await?;
    let removed = admin
        .clear_layer(&RequestContext::new_request(), CacheLayer::Query)
        .await;
    assert_eq!(removed, 1);
    assert_eq!(memory.len().await, 2);

    let searches = harness.index.searches();
    harness.ask("What is AI?").await?;
    assert_eq!(harness.index.searches(), searches);
    assert_eq!(harness.generator.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn ingest_invalidation_forces_fresh_retrieval() -> Result<()> {
    let (memory, store) = memory_store()?;
    let harness = Harness::new(Arc::clone(&store), CachePolicy::default()).await?;
    let admin = CacheAdmin::new(store);

    harness.ask("What is AI?").await?;
    let removed = admin
        .invalidate_on_ingest(&RequestContext::new_request(), "ai")
        .await?;
    assert_eq!(removed, 2);
    assert_eq!(memory.len().await, 1);

    let (embeds, searches, _) = harness.provider_calls();
    harness.ask("What is AI?").await?;
    let (embeds_after, searches_after, _) = harness.provider_calls();
    assert_eq!(embeds_after, embeds);
    assert_eq!(searches_after, searches + 1);
    Ok(())
}

/// Store that counts calls and never holds anything.
#[derive(Default)]
struct CountingStore {
    calls: AtomicU64,
}

impl CacheStorePort for CountingStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    fn get(&self, _ctx: &RequestContext, _key: CacheKey) -> BoxFuture<'_, Option<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Box::pin(async { None })
    }

    fn set(
        &self,
        _ctx: &RequestContext,
        _key: CacheKey,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> BoxFuture<'_, bool> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Box::pin(async { false })
    }

    fn delete(&self, _ctx: &RequestContext, _key: CacheKey) -> BoxFuture<'_, bool> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Box::pin(async { false })
    }

    fn clear(&self, _ctx: &RequestContext, _scope: ClearScope) -> BoxFuture<'_, u64> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Box::pin(async { 0 })
    }

    fn stats(&self, _ctx: &RequestContext) -> BoxFuture<'_, CacheStatistics> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Box::pin(async { CacheStatistics::disabled() })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[tokio::test]
async fn disabled_caching_never_touches_the_store() -> Result<()> {
    let store = Arc::new(CountingStore::default());
    let harness = Harness::new(store.clone(), CachePolicy::disabled()).await?;

    harness.ask("What is AI?").await?;
    harness.ask("What is AI?").await?;

    assert_eq!(store.calls.load(Ordering::Relaxed), 0);
    assert_eq!(harness.generator.calls(), 2);
    Ok(())
}

/// Backend failing every call.
struct BrokenBackend;

impl FallibleStore for BrokenBackend {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Redis
    }

    fn get(&self, _key: CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        Box::pin(async { Err(ErrorEnvelope::backend_unavailable("connection refused")) })
    }

    fn set(&self, _key: CacheKey, _value: Vec<u8>, _ttl: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Err(ErrorEnvelope::backend_unavailable("connection refused")) })
    }

    fn delete(&self, _key: CacheKey) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async { Err(ErrorEnvelope::backend_unavailable("connection refused")) })
    }

    fn clear_layers(&self, _layers: Vec<CacheLayer>) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async { Err(ErrorEnvelope::backend_unavailable("connection refused")) })
    }

    fn stats(&self) -> BoxFuture<'_, Result<CacheStatistics>> {
        Box::pin(async { Err(ErrorEnvelope::backend_unavailable("connection refused")) })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[tokio::test]
async fn broken_store_is_transparent() -> Result<()> {
    let broken: Arc<dyn CacheStorePort> = Arc::new(FailSoftStore::new(
        Arc::new(BrokenBackend),
        Duration::from_millis(200),
    ));
    let degraded = Harness::new(broken, CachePolicy::default()).await?;
    let (_, working) = memory_store()?;
    let cached = Harness::new(working, CachePolicy::default()).await?;

    for question in ["What is AI?", "How is a sourdough starter made?", "What is AI?"] {
        assert_eq!(degraded.ask(question).await?, cached.ask(question).await?);
    }
    assert_eq!(degraded.generator.calls(), 3);
    assert_eq!(cached.generator.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn filters_and_scope_split_the_query_layer() -> Result<()> {
    let (memory, store) = memory_store()?;
    let harness = Harness::new(store, CachePolicy::default()).await?;
    let ctx = RequestContext::new_request();

    let mut filtered = QueryRequest::new("What is AI?");
    filtered.filters.insert("language".into(), "en".into());
    answer_query(&ctx, &harness.deps, QueryRequest::new("What is AI?")).await?;
    answer_query(&ctx, &harness.deps, filtered).await?;
    let scoped = answer_query(&ctx, &harness.deps, QueryRequest::new("What is AI?").with_doc_id("bread"))
        .await?;

    assert_eq!(harness.generator.calls(), 3);
    assert!(scoped.context.contains("sourdough"));
    assert!(!scoped.context.contains("Artificial"));
    // one embedding, two similarity lists (unscoped, bread), three answers
    assert_eq!(memory.len().await, 6);
    Ok(())
}

#[tokio::test]
async fn blank_question_is_invalid_input() -> Result<()> {
    let (memory, store) = memory_store()?;
    let harness = Harness::new(store, CachePolicy::default()).await?;

    let error = harness.ask("  \n").await.err();
    assert_eq!(error.map(|error| error.code), Some(ErrorCode::invalid_input()));
    assert!(memory.is_empty().await);
    assert_eq!(harness.telemetry.counter("cache.query.failed"), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_request_is_reported_as_aborted() -> Result<()> {
    let (memory, store) = memory_store()?;
    let harness = Harness::new(store, CachePolicy::default()).await?;
    let ctx = RequestContext::new_request();
    ctx.cancel();

    let error = answer_query(&ctx, &harness.deps, QueryRequest::new("What is AI?"))
        .await
        .err();
    assert!(error.is_some_and(|error| error.is_cancelled()));
    assert_eq!(harness.telemetry.counter("cache.query.aborted"), 1);
    assert!(memory.is_empty().await);
    Ok(())
}

struct SlowGenerator;

impl AnswerGenerationPort for SlowGenerator {
    fn generate(
        &self,
        _ctx: &RequestContext,
        _request: GenerateRequest,
    ) -> BoxFuture<'_, Result<Box<str>>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        })
    }
}

#[tokio::test]
async fn slow_generation_times_out_and_caches_nothing_for_the_query() -> Result<()> {
    let (memory, store) = memory_store()?;
    let mut harness = Harness::new(store, CachePolicy::default()).await?;
    harness.deps.generator = Arc::new(SlowGenerator);
    harness.deps.settings.timeout = Duration::from_millis(100);

    let error = harness.ask("What is AI?").await.err();
    assert_eq!(error.map(|error| error.code), Some(ErrorCode::timeout()));
    // embedding and similarity were computed before the generator stalled
    assert_eq!(memory.len().await, 2);
    Ok(())
}
