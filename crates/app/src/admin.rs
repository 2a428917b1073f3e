//! Cache administration: statistics, clears and ingest invalidation.

use docrag_domain::{CacheLayer, CacheStatistics};
use docrag_ports::{CacheStorePort, ClearScope, LoggerPort, TelemetryPort, log_fields};
use docrag_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Administrative operations over the shared store.
#[derive(Clone)]
pub struct CacheAdmin {
    store: Arc<dyn CacheStorePort>,
    logger: Option<Arc<dyn LoggerPort>>,
    telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl CacheAdmin {
    /// Admin over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStorePort>) -> Self {
        Self {
            store,
            logger: None,
            telemetry: None,
        }
    }

    /// Attach a logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LoggerPort>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Attach telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryPort>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Store statistics. Never fails; an unreachable backend reports
    /// `disconnected`.
    pub async fn get_stats(&self, ctx: &RequestContext) -> CacheStatistics {
        if let Some(logger) = self.logger.as_ref() {
            logger.debug("cache.admin.stats.start", "Reading cache statistics", None);
        }
        let stats = self.store.stats(ctx).await;
        if let Some(logger) = self.logger.as_ref() {
            logger.info(
                "cache.admin.stats",
                "Cache statistics read",
                Some(log_fields([
                    ("status", json!(stats.status)),
                    ("hitRate", json!(stats.hit_rate)),
                ])),
            );
        }
        stats
    }

    /// Remove every cached entry.
    pub async fn clear_all(&self, ctx: &RequestContext) -> u64 {
        self.clear(ctx, ClearScope::All, "clear_all").await
    }

    /// Remove the entries of one layer.
    pub async fn clear_layer(&self, ctx: &RequestContext, layer: CacheLayer) -> u64 {
        self.clear(ctx, ClearScope::Layer(layer), "clear_layer").await
    }

    /// Drop answers and hit lists that new content for `doc_id` may have
    /// made stale.
    ///
    /// Keys are content hashes, so the clear covers the whole query and
    /// similarity layers rather than only entries scoped to `doc_id`.
    /// Embeddings stay valid and are kept.
    #[tracing::instrument(name = "invalidate_on_ingest", skip_all, fields(doc_id = %doc_id))]
    pub async fn invalidate_on_ingest(&self, ctx: &RequestContext, doc_id: &str) -> Result<u64> {
        let doc_id = doc_id.trim();
        if doc_id.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "doc_id must not be blank",
            ));
        }
        ctx.ensure_not_cancelled("cache_admin.invalidate")?;

        if let Some(logger) = self.logger.as_ref() {
            logger.info(
                "cache.admin.invalidate.start",
                "Invalidating after ingest",
                Some(log_fields([("docId", json!(doc_id))])),
            );
        }
        let mut removed = 0;
        for layer in CacheLayer::INGEST_SENSITIVE {
            removed += self.store.clear(ctx, ClearScope::Layer(layer)).await;
        }
        self.count("cache.admin.invalidate", removed);
        if let Some(logger) = self.logger.as_ref() {
            logger.info(
                "cache.admin.invalidate",
                "Invalidated after ingest",
                Some(log_fields([("docId", json!(doc_id)), ("removed", json!(removed))])),
            );
        }
        Ok(removed)
    }

    async fn clear(&self, ctx: &RequestContext, scope: ClearScope, operation: &str) -> u64 {
        let started_at = Instant::now();
        if let Some(logger) = self.logger.as_ref() {
            logger.info(
                "cache.admin.clear.start",
                "Clearing cache",
                Some(log_fields([
                    ("scope", json!(scope.to_string())),
                    ("operation", json!(operation)),
                ])),
            );
        }
        let removed = self.store.clear(ctx, scope).await;
        self.count("cache.admin.clear", removed);
        if let Some(logger) = self.logger.as_ref() {
            logger.info(
                "cache.admin.clear",
                "Cache cleared",
                Some(log_fields([
                    ("scope", json!(scope.to_string())),
                    ("removed", json!(removed)),
                    (
                        "durationMs",
                        json!(u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)),
                    ),
                ])),
            );
        }
        removed
    }

    fn count(&self, name: &str, removed: u64) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            telemetry.increment_counter(name, removed, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingStore;
    use docrag_domain::{EmbeddingFingerprint, QueryFingerprint, SimilarityFingerprint, derive_key};
    use std::time::Duration;

    async fn seeded() -> Result<(Arc<RecordingStore>, CacheAdmin)> {
        let store = Arc::new(RecordingStore::default());
        let ctx = RequestContext::new_request();
        let ttl = Duration::from_secs(60);
        for text in ["a", "b"] {
            let keys = [
                derive_key(CacheLayer::Embedding, &EmbeddingFingerprint::new(text, "m")?),
                derive_key(CacheLayer::Similarity, &SimilarityFingerprint::new(text, None, 5)?),
                derive_key(CacheLayer::Query, &QueryFingerprint::new(text, None, 5)?),
            ];
            for key in keys {
                store.set(&ctx, key, b"{}".to_vec(), ttl).await;
            }
        }
        let admin = CacheAdmin::new(store.clone());
        Ok((store, admin))
    }

    #[tokio::test]
    async fn clear_layer_only_touches_that_layer() -> Result<()> {
        let (store, admin) = seeded().await?;
        let removed = admin
            .clear_layer(&RequestContext::new_request(), CacheLayer::Query)
            .await;
        assert_eq!(removed, 2);
        assert_eq!(store.layer_entries(CacheLayer::Embedding), 2);
        assert_eq!(store.layer_entries(CacheLayer::Similarity), 2);
        assert_eq!(admin.clear_all(&RequestContext::new_request()).await, 4);
        assert_eq!(store.entries(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn ingest_invalidation_keeps_embeddings() -> Result<()> {
        let (store, admin) = seeded().await?;
        let removed = admin
            .invalidate_on_ingest(&RequestContext::new_request(), "doc-42")
            .await?;
        assert_eq!(removed, 4);
        assert_eq!(store.entries(), 2);
        assert_eq!(store.layer_entries(CacheLayer::Embedding), 2);
        Ok(())
    }

    #[tokio::test]
    async fn blank_doc_id_is_rejected() -> Result<()> {
        let (store, admin) = seeded().await?;
        let error = admin
            .invalidate_on_ingest(&RequestContext::new_request(), " ")
            .await
            .err();
        assert_eq!(error.map(|error| error.code), Some(ErrorCode::invalid_input()));
        assert_eq!(store.entries(), 6);
        Ok(())
    }
}
