//! Cache configuration schema, defaults and validation.
//!
//! - Deserialization uses `serde` (TOML or JSON).
//! - Every field has a default, unknown fields are rejected.
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.

use docrag_domain::CacheLayer;
use docrag_shared::{ErrorCode, ErrorEnvelope, redact_url_credentials};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const TTL_MIN_SECS: u64 = 1;
const TTL_MAX_SECS: u64 = 31_536_000;

const STORE_OP_TIMEOUT_MIN_MS: u64 = 1;
const STORE_OP_TIMEOUT_MAX_MS: u64 = 60_000;
const STORE_BACKOFF_MAX_MS: u64 = 600_000;
const STORE_MEMORY_ENTRIES_MIN: u64 = 1;
const STORE_MEMORY_ENTRIES_MAX: u64 = 10_000_000;
const STORE_MEMORY_BYTES_MIN: u64 = 1;
const STORE_MEMORY_BYTES_MAX: u64 = 68_719_476_736;

const PIPELINE_TOP_K_MIN: u64 = 1;
const PIPELINE_TOP_K_MAX: u64 = 100;
const PIPELINE_CONTEXT_WORDS_MIN: u64 = 1;
const PIPELINE_CONTEXT_WORDS_MAX: u64 = 10_000;
const PIPELINE_TIMEOUT_MIN_MS: u64 = 1;
const PIPELINE_TIMEOUT_MAX_MS: u64 = 600_000;
const PIPELINE_WRITE_CONCURRENCY_MIN: u64 = 1;
const PIPELINE_WRITE_CONCURRENCY_MAX: u64 = 256;

/// Default model used for embedding fingerprints.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

const REDIS_SCHEMES: [&str; 3] = ["redis", "rediss", "unix"];

/// Top-level cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CacheConfig {
    /// Master switch; `false` installs no cache at all.
    pub enabled: bool,
    /// TTL used by layers whose `ttlSecs` is unset.
    pub default_ttl_secs: u64,
    /// Backing store settings.
    pub store: StoreConfig,
    /// Embedding layer.
    pub embedding: LayerConfig,
    /// Similarity-result layer.
    pub similarity: LayerConfig,
    /// Query-answer layer.
    pub query: LayerConfig,
    /// Query pipeline settings that feed fingerprints.
    pub pipeline: PipelineConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: 3_600,
            store: StoreConfig::default(),
            embedding: LayerConfig::with_ttl(86_400),
            similarity: LayerConfig::with_ttl(3_600),
            query: LayerConfig::with_ttl(300),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Validate the config.
    pub fn validate(self) -> Result<ValidatedCacheConfig, ConfigSchemaError> {
        validate_range("cache", "defaultTtlSecs", self.default_ttl_secs, TTL_MIN_SECS, TTL_MAX_SECS)?;
        self.store.validate()?;
        for layer in CacheLayer::ALL {
            if let Some(ttl) = self.layer(layer).ttl_secs {
                validate_range(layer.as_str(), "ttlSecs", ttl, TTL_MIN_SECS, TTL_MAX_SECS)?;
            }
        }
        self.validate_ttl_ordering()?;
        self.pipeline.validate()?;
        Ok(ValidatedCacheConfig { raw: self })
    }

    /// Settings for one layer.
    #[must_use]
    pub const fn layer(&self, layer: CacheLayer) -> &LayerConfig {
        match layer {
            CacheLayer::Embedding => &self.embedding,
            CacheLayer::Similarity => &self.similarity,
            CacheLayer::Query => &self.query,
        }
    }

    /// Effective TTL for a layer in seconds.
    #[must_use]
    pub fn ttl_secs(&self, layer: CacheLayer) -> u64 {
        self.layer(layer).ttl_secs.unwrap_or(self.default_ttl_secs)
    }

    /// Effective TTL for a layer.
    #[must_use]
    pub fn ttl(&self, layer: CacheLayer) -> Duration {
        Duration::from_secs(self.ttl_secs(layer))
    }

    /// Returns true when lookups for `layer` go through the cache.
    #[must_use]
    pub const fn layer_enabled(&self, layer: CacheLayer) -> bool {
        self.enabled && self.layer(layer).enabled
    }

    // Embeddings are the most stable data: they may never expire before the
    // results computed from them.
    fn validate_ttl_ordering(&self) -> Result<(), ConfigSchemaError> {
        let embedding = self.ttl_secs(CacheLayer::Embedding);
        for shorter in [CacheLayer::Similarity, CacheLayer::Query] {
            let ttl = self.ttl_secs(shorter);
            if ttl > embedding {
                return Err(ConfigSchemaError::TtlOrdering {
                    longer: CacheLayer::Embedding,
                    longer_secs: embedding,
                    shorter,
                    shorter_secs: ttl,
                });
            }
        }
        Ok(())
    }
}

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// Redis when `redisUrl` is set, memory otherwise.
    #[default]
    Auto,
    /// Shared Redis server.
    Redis,
    /// Process-local store.
    Memory,
    /// No store; every lookup misses.
    None,
}

impl StoreProvider {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Redis => "redis",
            Self::Memory => "memory",
            Self::None => "none",
        }
    }
}

impl fmt::Display for StoreProvider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for StoreProvider {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "none" | "off" => Ok(Self::None),
            other => Err(other.to_string()),
        }
    }
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StoreConfig {
    /// Store selection.
    pub provider: StoreProvider,
    /// Redis connection URL (`redis://`, `rediss://` or `unix://`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<Box<str>>,
    /// Prefix prepended to every key, for sharing one Redis database.
    pub key_namespace: Box<str>,
    /// Upper bound for a single store operation.
    pub operation_timeout_ms: u64,
    /// Minimum delay between reconnect attempts.
    pub reconnect_backoff_ms: u64,
    /// Memory store entry limit.
    pub memory_max_entries: u32,
    /// Memory store byte limit.
    pub memory_max_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::Auto,
            redis_url: None,
            key_namespace: "".into(),
            operation_timeout_ms: 2_000,
            reconnect_backoff_ms: 1_000,
            memory_max_entries: 10_000,
            memory_max_bytes: 67_108_864,
        }
    }
}

impl StoreConfig {
    /// Provider after resolving `auto`.
    #[must_use]
    pub const fn resolved_provider(&self) -> StoreProvider {
        match self.provider {
            StoreProvider::Auto if self.redis_url.is_some() => StoreProvider::Redis,
            StoreProvider::Auto => StoreProvider::Memory,
            other => other,
        }
    }

    /// Operation timeout.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Reconnect backoff.
    #[must_use]
    pub const fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_range(
            "store",
            "operationTimeoutMs",
            self.operation_timeout_ms,
            STORE_OP_TIMEOUT_MIN_MS,
            STORE_OP_TIMEOUT_MAX_MS,
        )?;
        validate_range(
            "store",
            "reconnectBackoffMs",
            self.reconnect_backoff_ms,
            0,
            STORE_BACKOFF_MAX_MS,
        )?;
        validate_range(
            "store",
            "memoryMaxEntries",
            u64::from(self.memory_max_entries),
            STORE_MEMORY_ENTRIES_MIN,
            STORE_MEMORY_ENTRIES_MAX,
        )?;
        validate_range(
            "store",
            "memoryMaxBytes",
            self.memory_max_bytes,
            STORE_MEMORY_BYTES_MIN,
            STORE_MEMORY_BYTES_MAX,
        )?;
        if self.key_namespace.chars().any(char::is_whitespace) {
            return Err(ConfigSchemaError::InvalidValue {
                section: "store",
                field: "keyNamespace",
                reason: "must not contain whitespace".to_string(),
            });
        }

        match self.redis_url.as_deref() {
            Some(url) => validate_redis_url(url)?,
            None if self.provider == StoreProvider::Redis => {
                return Err(ConfigSchemaError::MissingRedisUrl);
            },
            None => {},
        }
        Ok(())
    }
}

/// Per-layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LayerConfig {
    /// Whether the layer caches at all.
    pub enabled: bool,
    /// Entry lifetime; `null` falls back to `defaultTtlSecs`.
    pub ttl_secs: Option<u64>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: None,
        }
    }
}

impl LayerConfig {
    const fn with_ttl(ttl_secs: u64) -> Self {
        Self {
            enabled: true,
            ttl_secs: Some(ttl_secs),
        }
    }
}

/// Query pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Similarity hits fetched per question.
    pub top_k: u32,
    /// Context is truncated to this many words before generation.
    pub context_max_words: u32,
    /// End-to-end deadline for one question.
    pub timeout_ms: u64,
    /// Embedding model identifier.
    pub embedding_model: Box<str>,
    /// Concurrent store writes after a batch embedding call.
    pub write_concurrency: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            context_max_words: 200,
            timeout_ms: 25_000,
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            write_concurrency: 8,
        }
    }
}

impl PipelineConfig {
    /// Pipeline deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_range(
            "pipeline",
            "topK",
            u64::from(self.top_k),
            PIPELINE_TOP_K_MIN,
            PIPELINE_TOP_K_MAX,
        )?;
        validate_range(
            "pipeline",
            "contextMaxWords",
            u64::from(self.context_max_words),
            PIPELINE_CONTEXT_WORDS_MIN,
            PIPELINE_CONTEXT_WORDS_MAX,
        )?;
        validate_range(
            "pipeline",
            "timeoutMs",
            self.timeout_ms,
            PIPELINE_TIMEOUT_MIN_MS,
            PIPELINE_TIMEOUT_MAX_MS,
        )?;
        validate_range(
            "pipeline",
            "writeConcurrency",
            u64::from(self.write_concurrency),
            PIPELINE_WRITE_CONCURRENCY_MIN,
            PIPELINE_WRITE_CONCURRENCY_MAX,
        )?;
        if self.embedding_model.trim().is_empty() {
            return Err(ConfigSchemaError::InvalidValue {
                section: "pipeline",
                field: "embeddingModel",
                reason: "must be non-empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Validated config wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCacheConfig {
    raw: CacheConfig,
}

impl ValidatedCacheConfig {
    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &CacheConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> CacheConfig {
        self.raw
    }
}

impl AsRef<CacheConfig> for ValidatedCacheConfig {
    fn as_ref(&self) -> &CacheConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedCacheConfig {
    type Target = CacheConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Schema validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// A numeric value is out of bounds.
    OutOfRange {
        /// Schema section (e.g. `store`).
        section: &'static str,
        /// Field name in the config file (e.g. `operationTimeoutMs`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A shorter-lived layer outlives the embedding layer.
    TtlOrdering {
        /// Layer that must live longest.
        longer: CacheLayer,
        /// Its effective TTL.
        longer_secs: u64,
        /// Offending layer.
        shorter: CacheLayer,
        /// Its effective TTL.
        shorter_secs: u64,
    },
    /// The Redis URL is malformed or uses an unsupported scheme.
    InvalidRedisUrl {
        /// URL with credentials masked.
        url: String,
        /// Parse failure.
        reason: String,
    },
    /// `provider = redis` without a `redisUrl`.
    MissingRedisUrl,
    /// A string field has an invalid value.
    InvalidValue {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::OutOfRange { .. } => ErrorCode::new("config", "invalid_limit"),
            Self::TtlOrdering { .. } => ErrorCode::new("config", "invalid_ttl_ordering"),
            Self::InvalidRedisUrl { .. } => ErrorCode::new("config", "invalid_url"),
            Self::MissingRedisUrl => ErrorCode::new("config", "missing_redis_url"),
            Self::InvalidValue { .. } => ErrorCode::new("config", "invalid_value"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min}, {max}] (got {value})"
            ),
            Self::TtlOrdering {
                longer,
                longer_secs,
                shorter,
                shorter_secs,
            } => write!(
                formatter,
                "{shorter}.ttlSecs ({shorter_secs}) must not exceed {longer}.ttlSecs ({longer_secs})"
            ),
            Self::InvalidRedisUrl { url, reason } => {
                write!(formatter, "store.redisUrl is invalid ({reason}): {url}")
            },
            Self::MissingRedisUrl => {
                formatter.write_str("store.provider is redis but store.redisUrl is not set")
            },
            Self::InvalidValue {
                section,
                field,
                reason,
            } => write!(formatter, "{section}.{field} {reason}"),
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::OutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value", value.to_string())
                .with_metadata("min", min.to_string())
                .with_metadata("max", max.to_string()),
            ConfigSchemaError::TtlOrdering {
                longer, shorter, ..
            } => envelope
                .with_metadata("longer", longer.as_str())
                .with_metadata("shorter", shorter.as_str()),
            ConfigSchemaError::InvalidRedisUrl { url, .. } => envelope
                .with_metadata("field", "store.redisUrl")
                .with_metadata("url", url),
            ConfigSchemaError::MissingRedisUrl => {
                envelope.with_metadata("field", "store.redisUrl")
            },
            ConfigSchemaError::InvalidValue { section, field, .. } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field),
        }
    }
}

const fn validate_range(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::OutOfRange {
            section,
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Check that `url` is a Redis connection URL.
pub fn validate_redis_url(url: &str) -> Result<(), ConfigSchemaError> {
    let parsed = Url::parse(url.trim()).map_err(|error| ConfigSchemaError::InvalidRedisUrl {
        url: redact_url_credentials(url),
        reason: error.to_string(),
    })?;
    if !REDIS_SCHEMES.contains(&parsed.scheme()) {
        return Err(ConfigSchemaError::InvalidRedisUrl {
            url: redact_url_credentials(url),
            reason: format!("unsupported scheme `{}`", parsed.scheme()),
        });
    }
    Ok(())
}

/// Parse a config from JSON without validating it.
pub fn parse_cache_config_json(input: &str) -> Result<CacheConfig, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })
}

/// Parse a config from TOML without validating it.
pub fn parse_cache_config_toml(input: &str) -> Result<CacheConfig, ErrorEnvelope> {
    toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })
}
