//! Composition root: turns a validated config into a wired cache.

use crate::InfraResult;
use crate::observability::Observability;
use docrag_adapters::{
    CachingEmbedding, FailSoftStore, FallibleStore, MemoryStore, NoopStore, RedisStore,
    RedisStoreConfig,
};
use docrag_app::{
    AnswerQueryDeps, CacheAdmin, CachePolicy, CachedSimilaritySearch, LayerPolicy,
    PipelineSettings, ResultCache,
};
use docrag_config::{CacheConfig, StoreProvider, ValidatedCacheConfig};
use docrag_domain::{CacheLayer, StoreBackend};
use docrag_ports::{
    AnswerGenerationPort, CacheStorePort, EmbeddingPort, LoggerPort, SimilaritySearchPort,
    TelemetryPort, log_fields,
};
use serde_json::json;
use std::sync::Arc;

/// Build the process-wide store selected by `config`.
///
/// `enabled = false` and `provider = none` yield the no-op store. Redis and
/// memory stores are wrapped fail-soft with the configured operation timeout.
/// Redis connects lazily, so an unreachable server is not an error here.
pub fn build_cache_store(
    config: &CacheConfig,
    logger: Option<Arc<dyn LoggerPort>>,
    telemetry: Option<Arc<dyn TelemetryPort>>,
) -> InfraResult<Arc<dyn CacheStorePort>> {
    if !config.enabled {
        return Ok(Arc::new(NoopStore));
    }
    let store = &config.store;
    let backend: Arc<dyn FallibleStore> = match store.resolved_provider() {
        StoreProvider::None => return Ok(Arc::new(NoopStore)),
        StoreProvider::Memory | StoreProvider::Auto => Arc::new(MemoryStore::new(
            usize::try_from(store.memory_max_entries).unwrap_or(usize::MAX),
            store.memory_max_bytes,
        )?),
        StoreProvider::Redis => {
            let url = store.redis_url.clone().unwrap_or_default();
            Arc::new(RedisStore::new(RedisStoreConfig {
                namespace: store.key_namespace.clone(),
                reconnect_backoff: store.reconnect_backoff(),
                // Must stay below the operation timeout.
                connect_timeout: store.operation_timeout() / 2,
                ..RedisStoreConfig::new(url)
            })?)
        },
    };

    if let Some(logger) = logger.as_ref() {
        logger.info(
            "cache.store.selected",
            "Cache store selected",
            Some(log_fields([
                ("backend", json!(backend.backend())),
                ("operationTimeoutMs", json!(store.operation_timeout_ms)),
            ])),
        );
    }

    let mut fail_soft = FailSoftStore::new(backend, store.operation_timeout());
    if let Some(logger) = logger {
        fail_soft = fail_soft.with_logger(logger);
    }
    if let Some(telemetry) = telemetry {
        fail_soft = fail_soft.with_telemetry(telemetry);
    }
    Ok(Arc::new(fail_soft))
}

/// Per-layer policies; the master switch disables every layer.
#[must_use]
pub fn cache_policy(config: &CacheConfig) -> CachePolicy {
    let layer = |layer: CacheLayer| {
        if config.layer_enabled(layer) {
            LayerPolicy::enabled(config.ttl(layer))
        } else {
            LayerPolicy::disabled()
        }
    };
    CachePolicy {
        embedding: layer(CacheLayer::Embedding),
        similarity: layer(CacheLayer::Similarity),
        query: layer(CacheLayer::Query),
    }
}

/// Pipeline knobs from config.
#[must_use]
pub const fn pipeline_settings(config: &CacheConfig) -> PipelineSettings {
    PipelineSettings {
        top_k: config.pipeline.top_k,
        context_max_words: config.pipeline.context_max_words,
        timeout: config.pipeline.timeout(),
    }
}

/// Everything the cached pipeline needs, built once per process.
#[derive(Clone)]
pub struct CacheRuntime {
    store: Arc<dyn CacheStorePort>,
    policy: CachePolicy,
    settings: PipelineSettings,
    write_concurrency: usize,
    observability: Observability,
}

impl CacheRuntime {
    /// Wire the store and policies from `config`.
    pub fn build(config: &ValidatedCacheConfig, observability: Observability) -> InfraResult<Self> {
        let store = build_cache_store(
            config,
            observability.logger.clone(),
            observability.telemetry.clone(),
        )?;
        Ok(Self::with_store(config, store, observability))
    }

    /// Wire around an existing store.
    #[must_use]
    pub fn with_store(
        config: &ValidatedCacheConfig,
        store: Arc<dyn CacheStorePort>,
        observability: Observability,
    ) -> Self {
        Self {
            store,
            policy: cache_policy(config),
            settings: pipeline_settings(config),
            write_concurrency: usize::try_from(config.pipeline.write_concurrency).unwrap_or(1),
            observability,
        }
    }

    /// Shared store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn CacheStorePort> {
        Arc::clone(&self.store)
    }

    /// Backend behind the store.
    #[must_use]
    pub fn backend(&self) -> StoreBackend {
        self.store.backend()
    }

    /// Active layer policies.
    #[must_use]
    pub const fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Pipeline knobs.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Same runtime with different observability (e.g. request-scoped).
    #[must_use]
    pub fn with_observability(&self, observability: Observability) -> Self {
        Self {
            observability,
            ..self.clone()
        }
    }

    /// Wrap `provider` in the embedding cache, or return it untouched when
    /// the embedding layer is disabled.
    #[must_use]
    pub fn wrap_embedding(&self, provider: Arc<dyn EmbeddingPort>) -> Arc<dyn EmbeddingPort> {
        if !self.policy.embedding.enabled {
            return provider;
        }
        let mut caching = CachingEmbedding::new(provider, self.store(), self.policy.embedding.ttl)
            .with_write_concurrency(self.write_concurrency);
        if let Some(logger) = self.observability.logger.clone() {
            caching = caching.with_logger(logger);
        }
        if let Some(telemetry) = self.observability.telemetry.clone() {
            caching = caching.with_telemetry(telemetry);
        }
        Arc::new(caching)
    }

    /// Read-through cache over the shared store.
    #[must_use]
    pub fn result_cache(&self) -> ResultCache {
        let mut cache = ResultCache::new(self.store(), self.policy);
        if let Some(logger) = self.observability.logger.clone() {
            cache = cache.with_logger(logger);
        }
        if let Some(telemetry) = self.observability.telemetry.clone() {
            cache = cache.with_telemetry(telemetry);
        }
        cache
    }

    /// Administration over the shared store.
    #[must_use]
    pub fn admin(&self) -> CacheAdmin {
        let mut admin = CacheAdmin::new(self.store());
        if let Some(logger) = self.observability.logger.clone() {
            admin = admin.with_logger(logger);
        }
        if let Some(telemetry) = self.observability.telemetry.clone() {
            admin = admin.with_telemetry(telemetry);
        }
        admin
    }

    /// Full cached answer pipeline over the given providers.
    #[must_use]
    pub fn answer_deps(
        &self,
        embedding: Arc<dyn EmbeddingPort>,
        search: Arc<dyn SimilaritySearchPort>,
        generator: Arc<dyn AnswerGenerationPort>,
    ) -> AnswerQueryDeps {
        let cache = self.result_cache();
        AnswerQueryDeps {
            similarity: CachedSimilaritySearch::new(
                self.wrap_embedding(embedding),
                search,
                cache.clone(),
            ),
            generator,
            cache,
            settings: self.settings,
            logger: self.observability.logger.clone(),
            telemetry: self.observability.telemetry.clone(),
        }
    }

    /// Release store connections.
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
    }
}

/// Layer TTL as reported to users.
#[must_use]
pub fn describe_ttl(policy: LayerPolicy) -> Option<u64> {
    policy.enabled.then(|| policy.ttl.as_secs())
}

impl std::fmt::Debug for CacheRuntime {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CacheRuntime")
            .field("backend", &self.store.backend())
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_config::{CacheEnv, load_cache_config_from_sources};
    use std::time::Duration;

    fn config(json: &str) -> InfraResult<ValidatedCacheConfig> {
        load_cache_config_from_sources(Some(json), None, &CacheEnv::default())
    }

    #[test]
    fn auto_without_url_selects_memory() -> InfraResult<()> {
        let config = config("{}")?;
        let store = build_cache_store(&config, None, None)?;
        assert_eq!(store.backend(), StoreBackend::Memory);
        Ok(())
    }

    #[test]
    fn auto_with_url_selects_redis() -> InfraResult<()> {
        let config = config(r#"{"store":{"redisUrl":"redis://127.0.0.1:1/0"}}"#)?;
        let store = build_cache_store(&config, None, None)?;
        assert_eq!(store.backend(), StoreBackend::Redis);
        Ok(())
    }

    #[test]
    fn disabled_cache_uses_noop_store_and_no_wrapper() -> InfraResult<()> {
        let config = config(r#"{"enabled":false}"#)?;
        let store = build_cache_store(&config, None, None)?;
        assert_eq!(store.backend(), StoreBackend::None);

        let policy = cache_policy(&config);
        assert_eq!(policy, CachePolicy::disabled());
        Ok(())
    }

    #[test]
    fn provider_none_uses_noop_store() -> InfraResult<()> {
        let config = config(r#"{"store":{"provider":"none"}}"#)?;
        let store = build_cache_store(&config, None, None)?;
        assert_eq!(store.backend(), StoreBackend::None);
        Ok(())
    }

    #[test]
    fn null_layer_ttl_falls_back_to_default() -> InfraResult<()> {
        let config = config(r#"{"defaultTtlSecs":120,"query":{"ttlSecs":null}}"#)?;
        let policy = cache_policy(&config);
        assert_eq!(policy.query.ttl, Duration::from_secs(120));
        assert_eq!(policy.embedding.ttl, Duration::from_secs(86_400));
        assert_eq!(describe_ttl(policy.query), Some(120));
        Ok(())
    }

    #[test]
    fn disabled_layer_is_reported_without_ttl() -> InfraResult<()> {
        let config = config(r#"{"similarity":{"enabled":false}}"#)?;
        let policy = cache_policy(&config);
        assert!(!policy.similarity.enabled);
        assert!(policy.query.enabled);
        assert_eq!(describe_ttl(policy.similarity), None);
        Ok(())
    }

    #[test]
    fn pipeline_settings_follow_config() -> InfraResult<()> {
        let config = config(r#"{"pipeline":{"topK":4,"contextMaxWords":50,"timeoutMs":900}}"#)?;
        let settings = pipeline_settings(&config);
        assert_eq!(settings.top_k, 4);
        assert_eq!(settings.context_max_words, 50);
        assert_eq!(settings.timeout, Duration::from_millis(900));
        Ok(())
    }
}
