use super::FallibleStore;
use docrag_domain::{CacheKey, CacheLayer, CacheStatistics, StoreBackend};
use docrag_ports::{
    BoxFuture, CacheStorePort, ClearScope, LogFields, LoggerPort, TelemetryPort, TelemetryTags,
    log_fields,
};
use docrag_shared::{ErrorEnvelope, RequestContext, Result, timeout_with_context};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a [`FallibleStore`] so that no store failure reaches callers.
///
/// Every call is bounded by `operation_timeout`. Failures are logged at
/// `warn` under `cache.store.<op>_failed` (through `tracing` when no logger
/// is attached), counted as `cache.store.error`, and answered with `None`,
/// `false`, `0` or a `disconnected` snapshot.
#[derive(Clone)]
pub struct FailSoftStore {
    inner: Arc<dyn FallibleStore>,
    operation_timeout: Duration,
    logger: Option<Arc<dyn LoggerPort>>,
    telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl FailSoftStore {
    /// Wrap `inner`, bounding each call by `operation_timeout`.
    #[must_use]
    pub fn new(inner: Arc<dyn FallibleStore>, operation_timeout: Duration) -> Self {
        Self {
            inner,
            operation_timeout,
            logger: None,
            telemetry: None,
        }
    }

    /// Log absorbed failures.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LoggerPort>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Count absorbed failures.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryPort>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    async fn guarded<T, F>(&self, ctx: &RequestContext, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        timeout_with_context(ctx, self.operation_timeout, operation, fut).await
    }

    fn absorb(&self, operation: &'static str, layer: Option<CacheLayer>, error: &ErrorEnvelope) {
        if error.is_cancelled() {
            return;
        }
        if let Some(telemetry) = self.telemetry.as_ref() {
            let mut tags = TelemetryTags::new();
            tags.insert("operation".into(), operation.into());
            tags.insert("backend".into(), self.inner.backend().to_string().into());
            telemetry.increment_counter("cache.store.error", 1, Some(&tags));
        }
        let event = format!("cache.store.{operation}_failed");
        let backend = self.inner.backend();
        let Some(logger) = self.logger.as_ref() else {
            let layer = layer.map_or("-", CacheLayer::as_str);
            tracing::warn!(
                target: "docrag",
                event = %event,
                backend = %backend,
                error_code = %error.code,
                layer = %layer,
                error = %error.message,
                "cache store call failed; continuing without cache"
            );
            return;
        };
        let mut fields: LogFields = log_fields([
            ("backend", json!(backend.to_string())),
            ("errorCode", json!(error.code.to_string())),
            ("error", json!(error.message)),
        ]);
        if let Some(layer) = layer {
            fields.insert("layer".into(), json!(layer.as_str()));
        }
        logger.warn(
            &event,
            "cache store call failed; continuing without cache",
            Some(fields),
        );
    }
}

impl CacheStorePort for FailSoftStore {
    fn backend(&self) -> StoreBackend {
        self.inner.backend()
    }

    fn get(&self, ctx: &RequestContext, key: CacheKey) -> BoxFuture<'_, Option<Vec<u8>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let layer = key.layer();
            match self.guarded(&ctx, "get", self.inner.get(key)).await {
                Ok(value) => value,
                Err(error) => {
                    self.absorb("get", layer, &error);
                    None
                },
            }
        })
    }

    fn set(
        &self,
        ctx: &RequestContext,
        key: CacheKey,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'_, bool> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let layer = key.layer();
            if ttl.is_zero() {
                // A zero TTL never stores; it only clears a previous value.
                if let Err(error) = self.guarded(&ctx, "set", self.inner.delete(key)).await {
                    self.absorb("set", layer, &error);
                }
                return false;
            }
            match self.guarded(&ctx, "set", self.inner.set(key, value, ttl)).await {
                Ok(()) => true,
                Err(error) => {
                    self.absorb("set", layer, &error);
                    false
                },
            }
        })
    }

    fn delete(&self, ctx: &RequestContext, key: CacheKey) -> BoxFuture<'_, bool> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let layer = key.layer();
            match self.guarded(&ctx, "delete", self.inner.delete(key)).await {
                Ok(removed) => removed,
                Err(error) => {
                    self.absorb("delete", layer, &error);
                    false
                },
            }
        })
    }

    fn clear(&self, ctx: &RequestContext, scope: ClearScope) -> BoxFuture<'_, u64> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let layer = match scope {
                ClearScope::All => None,
                ClearScope::Layer(layer) => Some(layer),
            };
            match self
                .guarded(&ctx, "clear", self.inner.clear_layers(scope.layers()))
                .await
            {
                Ok(removed) => removed,
                Err(error) => {
                    self.absorb("clear", layer, &error);
                    0
                },
            }
        })
    }

    fn stats(&self, ctx: &RequestContext) -> BoxFuture<'_, CacheStatistics> {
        let ctx = ctx.clone();
        Box::pin(async move {
            match self.guarded(&ctx, "stats", self.inner.stats()).await {
                Ok(stats) => stats,
                Err(error) => {
                    self.absorb("stats", None, &error);
                    CacheStatistics::disconnected(self.inner.backend(), Some(&error.message))
                },
            }
        })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        self.inner.shutdown()
    }
}
