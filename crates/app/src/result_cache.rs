//! Read-through cache for expensive, serializable results.

use docrag_domain::{CacheLayer, Fingerprint, derive_key};
use docrag_ports::{
    CacheStorePort, LoggerPort, TelemetryPort, decode_payload, encode_payload, layer_tags,
    log_fields,
};
use docrag_shared::{RequestContext, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Whether a layer caches, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerPolicy {
    /// Layer is active.
    pub enabled: bool,
    /// Entry lifetime.
    pub ttl: Duration,
}

impl LayerPolicy {
    /// Active layer with `ttl`.
    #[must_use]
    pub const fn enabled(ttl: Duration) -> Self {
        Self { enabled: true, ttl }
    }

    /// Inactive layer.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: Duration::ZERO,
        }
    }
}

/// Per-layer policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Embedding vectors.
    pub embedding: LayerPolicy,
    /// Similarity-search hit lists.
    pub similarity: LayerPolicy,
    /// Full query answers.
    pub query: LayerPolicy,
}

impl CachePolicy {
    /// Policy for `layer`.
    #[must_use]
    pub const fn layer(&self, layer: CacheLayer) -> LayerPolicy {
        match layer {
            CacheLayer::Embedding => self.embedding,
            CacheLayer::Similarity => self.similarity,
            CacheLayer::Query => self.query,
        }
    }

    /// Every layer off.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            embedding: LayerPolicy::disabled(),
            similarity: LayerPolicy::disabled(),
            query: LayerPolicy::disabled(),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            embedding: LayerPolicy::enabled(Duration::from_secs(86_400)),
            similarity: LayerPolicy::enabled(Duration::from_secs(3_600)),
            query: LayerPolicy::enabled(Duration::from_secs(300)),
        }
    }
}

/// Get-or-compute over the cache store.
///
/// Store trouble never fails a call: the store port is fail-soft and
/// unreadable payloads are treated as misses and overwritten.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStorePort>,
    policy: CachePolicy,
    logger: Option<Arc<dyn LoggerPort>>,
    telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl ResultCache {
    /// Cache over `store` governed by `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStorePort>, policy: CachePolicy) -> Self {
        Self {
            store,
            policy,
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

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Configured TTL of `layer`.
    #[must_use]
    pub const fn layer_ttl(&self, layer: CacheLayer) -> Duration {
        self.policy.layer(layer).ttl
    }

    /// Return the cached value for `fingerprint`, or run `compute`, store its
    /// result for `ttl` and return it.
    ///
    /// A disabled layer runs `compute` without touching the store. Errors
    /// from `compute` propagate and nothing is stored.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        layer: CacheLayer,
        fingerprint: &impl Fingerprint,
        ttl: Duration,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.policy.layer(layer).enabled {
            return compute().await;
        }

        let key = derive_key(layer, fingerprint);
        if let Some(bytes) = self.store.get(ctx, key.clone()).await {
            match decode_payload::<T>(&bytes) {
                Ok(value) => {
                    self.count("cache.hit", layer);
                    self.debug(layer, "hit", key.short());
                    return Ok(value);
                },
                Err(error) => {
                    if let Some(logger) = self.logger.as_ref() {
                        logger.warn(
                            &format!("cache.{layer}.decode_failed"),
                            "cached payload unreadable; recomputing",
                            Some(log_fields([
                                ("key", json!(key.short())),
                                ("error", json!(error.message)),
                            ])),
                        );
                    }
                },
            }
        }
        self.count("cache.miss", layer);
        self.debug(layer, "miss", key.short());

        let value = compute().await?;
        match encode_payload(&value) {
            Ok(bytes) => {
                self.store.set(ctx, key, bytes, ttl).await;
            },
            Err(error) => {
                if let Some(logger) = self.logger.as_ref() {
                    logger.warn(
                        &format!("cache.{layer}.encode_failed"),
                        "result not cacheable",
                        Some(log_fields([("error", json!(error.message))])),
                    );
                }
            },
        }
        Ok(value)
    }

    fn count(&self, name: &str, layer: CacheLayer) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            telemetry.increment_counter(name, 1, Some(&layer_tags(layer)));
        }
    }

    fn debug(&self, layer: CacheLayer, outcome: &str, key: &str) {
        if let Some(logger) = self.logger.as_ref() {
            logger.debug(
                &format!("cache.{layer}.{outcome}"),
                outcome,
                Some(log_fields([("key", json!(key))])),
            );
        }
    }
}
