//! Local CLI orchestration helpers.
//!
//! Every `run_*` function loads the config from the process environment,
//! builds a fresh [`CacheRuntime`] and drives one request on a
//! current-thread Tokio runtime.

use crate::cache_runtime::{CacheRuntime, describe_ttl};
use crate::observability::Observability;
use crate::{InfraError, InfraResult};
use docrag_adapters::InMemoryTelemetry;
use docrag_adapters::local::{
    ExtractiveAnswerGenerator, HashEmbedding, LocalCorpusIndex, load_corpus_file,
};
use docrag_app::{QueryRequest, answer_query};
use docrag_config::{ValidatedCacheConfig, load_cache_config_std_env};
use docrag_domain::{CacheLayer, CacheStatistics, QueryAnswer, StoreBackend};
use docrag_ports::EmbeddingPort;
use docrag_shared::{ErrorCode, ErrorEnvelope, RequestContext};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Service name reported by `health`.
pub const SERVICE_NAME: &str = "document-rag-backend";

/// Dimension of the offline embedding model.
const LOCAL_EMBEDDING_DIMENSION: usize = 384;

/// Result of a clear command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    /// `all` or the layer name.
    pub scope: Box<str>,
    /// Entries removed.
    pub removed: u64,
}

/// Result of an ingest invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateReport {
    /// Document whose ingest triggered the invalidation.
    pub doc_id: Box<str>,
    /// Layers that were cleared.
    pub layers: Vec<CacheLayer>,
    /// Entries removed.
    pub removed: u64,
}

/// Health summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Always `healthy`; a broken cache degrades, it does not fail.
    pub status: Box<str>,
    /// Service identifier.
    pub service: Box<str>,
    /// Cache status.
    pub cache: CacheStatistics,
}

/// Input for a local query run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalQueryRequest {
    /// Question to answer.
    pub question: Box<str>,
    /// Restrict retrieval to one document.
    pub doc_id: Option<Box<str>>,
    /// Corpus file (`.json` chunks or plain text).
    pub corpus_path: PathBuf,
    /// Times the question is asked in this process.
    pub repeat: u32,
}

/// Cache activity for one layer during a query run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerActivity {
    /// Layer.
    pub layer: CacheLayer,
    /// Whether the layer is caching.
    pub enabled: bool,
    /// Effective TTL when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    /// Lookups served from the store.
    pub hits: u64,
    /// Lookups that fell through to the provider.
    pub misses: u64,
}

/// Calls that reached the local providers while answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCalls {
    /// Embedding requests (ingest excluded).
    pub embedding: u64,
    /// Similarity searches.
    pub search: u64,
    /// Answer generations.
    pub generation: u64,
}

/// Outcome of a local query run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalQueryReport {
    /// Answer from the last run.
    #[serde(flatten)]
    pub answer: QueryAnswer,
    /// Store backend in use.
    pub backend: StoreBackend,
    /// Chunks ingested from the corpus.
    pub chunks: usize,
    /// Times the question was asked.
    pub runs: u32,
    /// Per-layer cache activity.
    pub layers: Vec<LayerActivity>,
    /// Provider calls across all runs.
    pub provider_calls: ProviderCalls,
    /// Wall time per run.
    pub durations_ms: Vec<u64>,
}

/// Read store statistics.
pub fn run_cache_stats(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<CacheStatistics> {
    with_runtime(config_path, overrides_json, |ctx, runtime| async move {
        Ok(runtime.admin().get_stats(&ctx).await)
    })
}

/// Clear one layer, or the whole cache when `layer` is `None`.
pub fn run_cache_clear(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    layer: Option<CacheLayer>,
) -> InfraResult<ClearReport> {
    with_runtime(config_path, overrides_json, move |ctx, runtime| async move {
        Ok(clear_cache(&ctx, &runtime, layer).await)
    })
}

/// Run the ingest invalidation hook for `doc_id`.
pub fn run_cache_invalidate(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    doc_id: &str,
) -> InfraResult<InvalidateReport> {
    let doc_id: Box<str> = doc_id.into();
    with_runtime(config_path, overrides_json, move |ctx, runtime| async move {
        invalidate_cache(&ctx, &runtime, &doc_id).await
    })
}

/// Service health plus cache status.
pub fn run_health(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<HealthReport> {
    with_runtime(config_path, overrides_json, |ctx, runtime| async move {
        Ok(health(&ctx, &runtime).await)
    })
}

/// Answer a question against a local corpus through the cached pipeline.
pub fn run_query_local(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    request: LocalQueryRequest,
) -> InfraResult<LocalQueryReport> {
    let config = load_cache_config_std_env(config_path, overrides_json)?;
    let observability = Observability::from_env();
    let ctx = RequestContext::new_request();
    let scoped = observability.scoped(&ctx);
    run_async_with_ctx(ctx, move |ctx| async move {
        query_local(&ctx, &config, &scoped, &request).await
    })
}

/// Clear through `runtime`.
pub async fn clear_cache(
    ctx: &RequestContext,
    runtime: &CacheRuntime,
    layer: Option<CacheLayer>,
) -> ClearReport {
    let admin = runtime.admin();
    match layer {
        Some(layer) => ClearReport {
            scope: layer.as_str().into(),
            removed: admin.clear_layer(ctx, layer).await,
        },
        None => ClearReport {
            scope: "all".into(),
            removed: admin.clear_all(ctx).await,
        },
    }
}

/// Invalidate through `runtime`.
pub async fn invalidate_cache(
    ctx: &RequestContext,
    runtime: &CacheRuntime,
    doc_id: &str,
) -> InfraResult<InvalidateReport> {
    let removed = runtime.admin().invalidate_on_ingest(ctx, doc_id).await?;
    Ok(InvalidateReport {
        doc_id: doc_id.trim().into(),
        layers: CacheLayer::INGEST_SENSITIVE.to_vec(),
        removed,
    })
}

/// Health through `runtime`.
pub async fn health(ctx: &RequestContext, runtime: &CacheRuntime) -> HealthReport {
    HealthReport {
        status: "healthy".into(),
        service: SERVICE_NAME.into(),
        cache: runtime.admin().get_stats(ctx).await,
    }
}

/// Ingest `request.corpus_path` with the raw offline embedder, then ask the
/// question `request.repeat` times through the cached pipeline.
#[tracing::instrument(name = "query_local", skip_all, fields(runs = request.repeat))]
pub async fn query_local(
    ctx: &RequestContext,
    config: &ValidatedCacheConfig,
    observability: &Observability,
    request: &LocalQueryRequest,
) -> InfraResult<LocalQueryReport> {
    let recorder = Arc::new(InMemoryTelemetry::default());
    let observability = Observability {
        logger: observability.logger.clone(),
        telemetry: Some(observability.telemetry_with(Arc::clone(&recorder))),
    };
    let runtime = CacheRuntime::build(config, observability)?;
    let report = query_with_runtime(ctx, config, &runtime, &recorder, request).await;
    runtime.shutdown().await;
    report
}

async fn query_with_runtime(
    ctx: &RequestContext,
    config: &ValidatedCacheConfig,
    runtime: &CacheRuntime,
    recorder: &InMemoryTelemetry,
    request: &LocalQueryRequest,
) -> InfraResult<LocalQueryReport> {
    let chunks = load_corpus_file(&request.corpus_path).await?;
    let embedder = Arc::new(HashEmbedding::new(
        &config.pipeline.embedding_model,
        LOCAL_EMBEDDING_DIMENSION,
    )?);
    let index = Arc::new(LocalCorpusIndex::new());
    let generator = Arc::new(ExtractiveAnswerGenerator::new());

    // Ingest bypasses the embedding cache: chunk vectors are never reused.
    let ingested = index.ingest(ctx, embedder.as_ref(), chunks).await?;
    if ingested == 0 {
        return Err(ErrorEnvelope::expected(
            ErrorCode::new("corpus", "empty"),
            "corpus contains no chunks",
        )
        .with_metadata("path", request.corpus_path.display().to_string()));
    }
    let ingest_calls = embedder.calls();

    let embedding: Arc<dyn EmbeddingPort> = embedder.clone();
    let deps = runtime.answer_deps(embedding, index.clone(), generator.clone());

    let runs = request.repeat.max(1);
    let mut durations_ms = Vec::new();
    let mut last = None;
    for _ in 0..runs {
        let started_at = Instant::now();
        let mut query = QueryRequest::new(request.question.clone());
        if let Some(doc_id) = request.doc_id.as_deref() {
            query = query.with_doc_id(doc_id);
        }
        last = Some(answer_query(&ctx.child(), &deps, query).await?);
        durations_ms.push(u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX));
    }
    let answer = last.ok_or_else(|| {
        ErrorEnvelope::invariant(ErrorCode::internal(), "query loop produced no answer")
    })?;

    let policy = runtime.policy();
    let layers = CacheLayer::ALL
        .into_iter()
        .map(|layer| {
            let layer_policy = policy.layer(layer);
            LayerActivity {
                layer,
                enabled: layer_policy.enabled,
                ttl_secs: describe_ttl(layer_policy),
                hits: recorder.layer_counter("cache.hit", layer.as_str()),
                misses: recorder.layer_counter("cache.miss", layer.as_str()),
            }
        })
        .collect();

    Ok(LocalQueryReport {
        answer,
        backend: runtime.backend(),
        chunks: ingested,
        runs,
        layers,
        provider_calls: ProviderCalls {
            embedding: embedder.calls().saturating_sub(ingest_calls),
            search: index.searches(),
            generation: generator.calls(),
        },
        durations_ms,
    })
}

fn with_runtime<F, Fut, T>(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    op: F,
) -> InfraResult<T>
where
    F: FnOnce(RequestContext, CacheRuntime) -> Fut,
    Fut: Future<Output = InfraResult<T>>,
{
    let config = load_cache_config_std_env(config_path, overrides_json)?;
    let observability = Observability::from_env();
    let ctx = RequestContext::new_request();
    let scoped = observability.scoped(&ctx);
    run_async_with_ctx(ctx, move |ctx| async move {
        let runtime = CacheRuntime::build(&config, scoped)?;
        let result = op(ctx, runtime.clone()).await;
        runtime.shutdown().await;
        result
    })
}

fn run_async_with_ctx<F, T>(
    ctx: RequestContext,
    op: impl FnOnce(RequestContext) -> F,
) -> InfraResult<T>
where
    F: Future<Output = Result<T, ErrorEnvelope>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(InfraError::from)?;
    runtime.block_on(async { op(ctx).await })
}
