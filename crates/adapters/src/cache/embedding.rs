use docrag_domain::{CacheKey, CacheLayer, EmbeddingFingerprint, derive_key};
use docrag_ports::{
    BoxFuture, CacheStorePort, EmbedBatchRequest, EmbedRequest, EmbeddingPort,
    EmbeddingProviderInfo, EmbeddingVector, LoggerPort, TelemetryPort, decode_payload,
    encode_payload, layer_tags, log_fields,
};
use docrag_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use futures_util::StreamExt;
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_WRITE_CONCURRENCY: usize = 8;

/// Embedding port wrapper that serves repeated texts from the cache store.
///
/// Keys come from `(text, model)`, so switching models never returns stale
/// vectors. Store failures are absorbed by the store; provider failures are
/// returned unchanged and nothing is written.
pub struct CachingEmbedding {
    inner: Arc<dyn EmbeddingPort>,
    store: Arc<dyn CacheStorePort>,
    ttl: Duration,
    write_concurrency: usize,
    logger: Option<Arc<dyn LoggerPort>>,
    telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl CachingEmbedding {
    /// Wrap `inner`, caching vectors in `store` for `ttl`.
    pub fn new(inner: Arc<dyn EmbeddingPort>, store: Arc<dyn CacheStorePort>, ttl: Duration) -> Self {
        Self {
            inner,
            store,
            ttl,
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
            logger: None,
            telemetry: None,
        }
    }

    /// Bound concurrent write-backs after a batch miss.
    #[must_use]
    pub fn with_write_concurrency(mut self, limit: usize) -> Self {
        self.write_concurrency = limit.max(1);
        self
    }

    /// Log decode failures.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LoggerPort>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Count hits and misses.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryPort>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    fn key_for(&self, text: &str) -> Result<CacheKey> {
        let fingerprint = EmbeddingFingerprint::new(text, &self.inner.provider().model)?;
        Ok(derive_key(CacheLayer::Embedding, &fingerprint))
    }

    fn count(&self, name: &str) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            telemetry.increment_counter(name, 1, Some(&layer_tags(CacheLayer::Embedding)));
        }
    }

    async fn lookup(&self, ctx: &RequestContext, key: &CacheKey) -> Option<EmbeddingVector> {
        let Some(bytes) = self.store.get(ctx, key.clone()).await else {
            self.count("cache.miss");
            return None;
        };
        match decode_payload::<Vec<f32>>(&bytes) {
            Ok(vector) => {
                self.count("cache.hit");
                Some(EmbeddingVector::from_vec(vector))
            },
            Err(error) => {
                self.count("cache.miss");
                if let Some(logger) = self.logger.as_ref() {
                    logger.warn(
                        "cache.embedding.decode_failed",
                        "cached embedding unreadable; recomputing",
                        Some(log_fields([
                            ("key", json!(key.short())),
                            ("error", json!(error.message)),
                        ])),
                    );
                }
                None
            },
        }
    }

    async fn write_back(&self, ctx: &RequestContext, key: CacheKey, vector: &EmbeddingVector) -> bool {
        match encode_payload(vector.as_slice()) {
            Ok(bytes) => self.store.set(ctx, key, bytes, self.ttl).await,
            Err(_) => false,
        }
    }
}

impl EmbeddingPort for CachingEmbedding {
    fn provider(&self) -> &EmbeddingProviderInfo {
        self.inner.provider()
    }

    fn embed(
        &self,
        ctx: &RequestContext,
        request: EmbedRequest,
    ) -> BoxFuture<'_, Result<EmbeddingVector>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let key = self.key_for(&request.text)?;
            if let Some(vector) = self.lookup(&ctx, &key).await {
                return Ok(vector);
            }

            let vector = self.inner.embed(&ctx, request).await?;
            self.write_back(&ctx, key, &vector).await;
            Ok(vector)
        })
    }

    fn embed_batch(
        &self,
        ctx: &RequestContext,
        request: EmbedBatchRequest,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            if request.texts.is_empty() {
                return Ok(Vec::new());
            }
            let keys = request
                .texts
                .iter()
                .map(|text| self.key_for(text))
                .collect::<Result<Vec<_>>>()?;

            let mut slots: Vec<Option<EmbeddingVector>> =
                join_all(keys.iter().map(|key| self.lookup(&ctx, key))).await;

            let missing: Vec<usize> = slots
                .iter()
                .enumerate()
                .filter_map(|(index, slot)| slot.is_none().then_some(index))
                .collect();
            if missing.is_empty() {
                return collect_slots(slots);
            }

            let texts = missing
                .iter()
                .filter_map(|index| request.texts.get(*index).cloned())
                .collect();
            let computed = self
                .inner
                .embed_batch(&ctx, EmbedBatchRequest { texts })
                .await?;
            if computed.len() != missing.len() {
                return Err(ErrorEnvelope::invariant(
                    ErrorCode::internal(),
                    format!(
                        "embedding provider returned {} vectors for {} texts",
                        computed.len(),
                        missing.len()
                    ),
                )
                .with_metadata("provider", self.inner.provider().name.to_string()));
            }

            let mut writes = Vec::with_capacity(missing.len());
            for (index, vector) in missing.into_iter().zip(computed) {
                if let (Some(slot), Some(key)) = (slots.get_mut(index), keys.get(index)) {
                    writes.push((key.clone(), vector.clone()));
                    *slot = Some(vector);
                }
            }
            futures_util::stream::iter(writes)
                .map(|(key, vector)| {
                    let ctx = &ctx;
                    async move { self.write_back(ctx, key, &vector).await }
                })
                .buffer_unordered(self.write_concurrency)
                .collect::<Vec<bool>>()
                .await;

            collect_slots(slots)
        })
    }
}

fn collect_slots(slots: Vec<Option<EmbeddingVector>>) -> Result<Vec<EmbeddingVector>> {
    slots
        .into_iter()
        .map(|slot| {
            slot.ok_or_else(|| {
                ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    "embedding batch left an unfilled slot",
                    ErrorClass::NonRetriable,
                )
            })
        })
        .collect()
}
