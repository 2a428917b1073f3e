//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing is strict (invalid values fail fast) and safe (Redis
//! credentials never reach error metadata).

use crate::schema::{CacheConfig, StoreProvider, ValidatedCacheConfig, validate_redis_url};
use docrag_shared::{ErrorCode, ErrorEnvelope, redact_if_secret, redact_url_credentials};
use std::collections::BTreeMap;
use std::fmt;

/// Env var: Redis connection URL.
pub const ENV_REDIS_URL: &str = "REDIS_URL";
/// Env var: default TTL in seconds.
pub const ENV_REDIS_TTL: &str = "REDIS_TTL";
/// Env var: query-answer TTL in seconds.
pub const ENV_CACHE_TTL: &str = "CACHE_TTL";
/// Env var: master cache switch.
pub const ENV_ENABLE_CACHING: &str = "ENABLE_CACHING";
/// Env var: store provider (`auto`, `redis`, `memory`, `none`).
pub const ENV_CACHE_STORE: &str = "DOCRAG_CACHE_STORE";
/// Env var: key namespace prefix.
pub const ENV_CACHE_NAMESPACE: &str = "DOCRAG_CACHE_NAMESPACE";
/// Env var: store operation timeout in milliseconds.
pub const ENV_CACHE_OP_TIMEOUT_MS: &str = "DOCRAG_CACHE_OP_TIMEOUT_MS";
/// Env var: embedding layer switch.
pub const ENV_CACHE_EMBEDDING_ENABLED: &str = "DOCRAG_CACHE_EMBEDDING_ENABLED";
/// Env var: similarity layer switch.
pub const ENV_CACHE_SIMILARITY_ENABLED: &str = "DOCRAG_CACHE_SIMILARITY_ENABLED";
/// Env var: query layer switch.
pub const ENV_CACHE_QUERY_ENABLED: &str = "DOCRAG_CACHE_QUERY_ENABLED";
/// Env var: embedding TTL in seconds.
pub const ENV_CACHE_EMBEDDING_TTL: &str = "DOCRAG_CACHE_EMBEDDING_TTL";
/// Env var: similarity TTL in seconds.
pub const ENV_CACHE_SIMILARITY_TTL: &str = "DOCRAG_CACHE_SIMILARITY_TTL";
/// Env var: query pipeline deadline in milliseconds.
pub const ENV_QUERY_TIMEOUT_MS: &str = "DOCRAG_QUERY_TIMEOUT_MS";
/// Env var: embedding model identifier.
pub const ENV_EMBEDDING_MODEL: &str = "DOCRAG_EMBEDDING_MODEL";

/// Every variable read by [`CacheEnv::from_std_env`].
pub const ALL_ENV_VARS: [&str; 14] = [
    ENV_REDIS_URL,
    ENV_REDIS_TTL,
    ENV_CACHE_TTL,
    ENV_ENABLE_CACHING,
    ENV_CACHE_STORE,
    ENV_CACHE_NAMESPACE,
    ENV_CACHE_OP_TIMEOUT_MS,
    ENV_CACHE_EMBEDDING_ENABLED,
    ENV_CACHE_SIMILARITY_ENABLED,
    ENV_CACHE_QUERY_ENABLED,
    ENV_CACHE_EMBEDDING_TTL,
    ENV_CACHE_SIMILARITY_TTL,
    ENV_QUERY_TIMEOUT_MS,
    ENV_EMBEDDING_MODEL,
];

/// Typed env-derived overrides for `CacheConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEnv {
    /// Override for `store.redisUrl`.
    pub redis_url: Option<Box<str>>,
    /// Override for `defaultTtlSecs`.
    pub default_ttl_secs: Option<u64>,
    /// Override for `query.ttlSecs`.
    pub query_ttl_secs: Option<u64>,
    /// Override for `enabled`.
    pub enabled: Option<bool>,
    /// Override for `store.provider`.
    pub store_provider: Option<StoreProvider>,
    /// Override for `store.keyNamespace`.
    pub key_namespace: Option<Box<str>>,
    /// Override for `store.operationTimeoutMs`.
    pub operation_timeout_ms: Option<u64>,
    /// Override for `embedding.enabled`.
    pub embedding_enabled: Option<bool>,
    /// Override for `similarity.enabled`.
    pub similarity_enabled: Option<bool>,
    /// Override for `query.enabled`.
    pub query_enabled: Option<bool>,
    /// Override for `embedding.ttlSecs`.
    pub embedding_ttl_secs: Option<u64>,
    /// Override for `similarity.ttlSecs`.
    pub similarity_ttl_secs: Option<u64>,
    /// Override for `pipeline.timeoutMs`.
    pub query_timeout_ms: Option<u64>,
    /// Override for `pipeline.embeddingModel`.
    pub embedding_model: Option<Box<str>>,
}

impl CacheEnv {
    /// Parse env overrides from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            redis_url: parse_optional_redis_url(map, ENV_REDIS_URL)?,
            default_ttl_secs: parse_optional_u64(map, ENV_REDIS_TTL)?,
            query_ttl_secs: parse_optional_u64(map, ENV_CACHE_TTL)?,
            enabled: parse_optional_bool(map, ENV_ENABLE_CACHING)?,
            store_provider: parse_optional_provider(map, ENV_CACHE_STORE)?,
            key_namespace: parse_optional_trimmed_string(map, ENV_CACHE_NAMESPACE)?,
            operation_timeout_ms: parse_optional_u64(map, ENV_CACHE_OP_TIMEOUT_MS)?,
            embedding_enabled: parse_optional_bool(map, ENV_CACHE_EMBEDDING_ENABLED)?,
            similarity_enabled: parse_optional_bool(map, ENV_CACHE_SIMILARITY_ENABLED)?,
            query_enabled: parse_optional_bool(map, ENV_CACHE_QUERY_ENABLED)?,
            embedding_ttl_secs: parse_optional_u64(map, ENV_CACHE_EMBEDDING_TTL)?,
            similarity_ttl_secs: parse_optional_u64(map, ENV_CACHE_SIMILARITY_TTL)?,
            query_timeout_ms: parse_optional_u64(map, ENV_QUERY_TIMEOUT_MS)?,
            embedding_model: parse_optional_trimmed_string(map, ENV_EMBEDDING_MODEL)?,
        })
    }

    /// Parse env overrides from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let map: BTreeMap<String, String> = ALL_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok().map(|value| ((*var).to_string(), value)))
            .collect();
        Self::from_map(&map)
    }

    /// Returns true when no variable was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Apply env overrides to a base config (env wins over file/default values),
/// then validate the result.
pub fn apply_env_overrides(
    base: CacheConfig,
    env: &CacheEnv,
) -> Result<ValidatedCacheConfig, ErrorEnvelope> {
    let mut config = base;

    set(&mut config.enabled, env.enabled);
    set(&mut config.default_ttl_secs, env.default_ttl_secs);

    set(&mut config.store.provider, env.store_provider);
    if let Some(url) = &env.redis_url {
        config.store.redis_url = Some(url.clone());
    }
    if let Some(namespace) = &env.key_namespace {
        config.store.key_namespace = namespace.clone();
    }
    set(&mut config.store.operation_timeout_ms, env.operation_timeout_ms);

    set(&mut config.embedding.enabled, env.embedding_enabled);
    set(&mut config.similarity.enabled, env.similarity_enabled);
    set(&mut config.query.enabled, env.query_enabled);
    if env.embedding_ttl_secs.is_some() {
        config.embedding.ttl_secs = env.embedding_ttl_secs;
    }
    if env.similarity_ttl_secs.is_some() {
        config.similarity.ttl_secs = env.similarity_ttl_secs;
    }
    if env.query_ttl_secs.is_some() {
        config.query.ttl_secs = env.query_ttl_secs;
    }

    set(&mut config.pipeline.timeout_ms, env.query_timeout_ms);
    if let Some(model) = &env.embedding_model {
        config.pipeline.embedding_model = model.clone();
    }

    config.validate().map_err(Into::into)
}

const fn set<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Numeric env var had an invalid value.
    InvalidNumber {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// URL env var had an invalid value.
    InvalidUrl {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidBool { .. } => ErrorCode::new("config", "invalid_env_bool"),
            Self::InvalidNumber { .. } => ErrorCode::new("config", "invalid_env_number"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_env_url"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
        }
    }

    /// Env var that failed to parse.
    #[must_use]
    pub const fn var(&self) -> &'static str {
        match self {
            Self::EmptyValue { var }
            | Self::InvalidBool { var, .. }
            | Self::InvalidNumber { var, .. }
            | Self::InvalidUrl { var, .. }
            | Self::InvalidEnum { var, .. } => var,
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidBool { var, .. } => write!(formatter, "{var} must be a boolean"),
            Self::InvalidNumber { var, .. } => {
                write!(formatter, "{var} must be a non-negative integer")
            },
            Self::InvalidUrl { var, .. } => write!(formatter, "{var} must be a valid Redis URL"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message).with_metadata("env_var", error.var());

        match error {
            EnvParseError::EmptyValue { .. } => envelope,
            EnvParseError::InvalidUrl { value, .. } => {
                envelope.with_metadata("value", redact_url_credentials(&value))
            },
            EnvParseError::InvalidBool { var, value }
            | EnvParseError::InvalidNumber { var, value }
            | EnvParseError::InvalidEnum { var, value } => {
                envelope.with_metadata("value", redact_if_secret(var, &value))
            },
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    Ok(Some(trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidNumber {
            var,
            value: trimmed.into_string(),
        })
}

fn parse_optional_bool(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<bool>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: trimmed.into_string(),
        }),
    }
}

fn parse_optional_provider(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<StoreProvider>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<StoreProvider>()
        .map(Some)
        .map_err(|value| EnvParseError::InvalidEnum { var, value })
}

fn parse_optional_redis_url(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };
    validate_redis_url(&trimmed).map_err(|_| EnvParseError::InvalidUrl {
        var,
        value: trimmed.to_string(),
    })?;
    Ok(Some(trimmed))
}
