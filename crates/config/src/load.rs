//! Config loading helpers (env + file + overrides).
//!
//! The loader owns the merge order and surfaces user-facing errors as typed
//! `ErrorEnvelope`s.

use crate::{CacheConfig, CacheEnv, StoreProvider, ValidatedCacheConfig, apply_env_overrides};
use docrag_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the cache config from sources using a fixed precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`CacheEnv`)
/// - overrides JSON (partial config)
/// - config JSON (file content)
/// - defaults (`CacheConfig::default()`)
pub fn load_cache_config_from_sources(
    config_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &CacheEnv,
) -> Result<ValidatedCacheConfig, ErrorEnvelope> {
    let config = match config_json {
        None => CacheConfig::default(),
        Some(input) => parse_config_unvalidated(input, ConfigFormat::Json)?,
    };
    finish_loading(config, overrides_json, env)
}

/// Load the cache config from an optional file path (`.toml` or `.json`).
pub fn load_cache_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &CacheEnv,
) -> Result<ValidatedCacheConfig, ErrorEnvelope> {
    let config = match config_path {
        None => CacheConfig::default(),
        Some(path) => {
            let config_text = read_config_file(path)?;
            let format = detect_config_format(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };
    finish_loading(config, overrides_json, env)
}

/// Load the cache config from the process env and an optional file path.
pub fn load_cache_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedCacheConfig, ErrorEnvelope> {
    let env = CacheEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_cache_config_from_path(config_path, overrides_json, &env)
}

fn finish_loading(
    mut config: CacheConfig,
    overrides_json: Option<&str>,
    env: &CacheEnv,
) -> Result<ValidatedCacheConfig, ErrorEnvelope> {
    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, &overrides);
    }

    // env is applied last and also validates the resulting config.
    apply_env_overrides(config, env)
}

/// Serialize the config as pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &CacheConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &CacheConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<CacheConfig, ErrorEnvelope> {
    let parsed = match format {
        ConfigFormat::Json => crate::parse_cache_config_json(input),
        ConfigFormat::Toml => crate::parse_cache_config_toml(input),
    };
    parsed.map_err(|error| error.with_metadata("source", "config"))
}

fn parse_overrides_json(input: &str) -> Result<CacheConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct CacheConfigOverrides {
    enabled: Option<bool>,
    default_ttl_secs: Option<u64>,
    store: StoreOverrides,
    embedding: LayerOverrides,
    similarity: LayerOverrides,
    query: LayerOverrides,
    pipeline: PipelineOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct StoreOverrides {
    provider: Option<StoreProvider>,
    redis_url: Option<Box<str>>,
    key_namespace: Option<Box<str>>,
    operation_timeout_ms: Option<u64>,
    reconnect_backoff_ms: Option<u64>,
    memory_max_entries: Option<u32>,
    memory_max_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct LayerOverrides {
    enabled: Option<bool>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct PipelineOverrides {
    top_k: Option<u32>,
    context_max_words: Option<u32>,
    timeout_ms: Option<u64>,
    embedding_model: Option<Box<str>>,
    write_concurrency: Option<u32>,
}

fn apply_overrides(config: &mut CacheConfig, overrides: &CacheConfigOverrides) {
    OverrideMapper::set(&mut config.enabled, overrides.enabled);
    OverrideMapper::set(&mut config.default_ttl_secs, overrides.default_ttl_secs);

    let store = &overrides.store;
    OverrideMapper::set(&mut config.store.provider, store.provider);
    if store.redis_url.is_some() {
        config.store.redis_url.clone_from(&store.redis_url);
    }
    OverrideMapper::set_box_str(&mut config.store.key_namespace, store.key_namespace.as_deref());
    OverrideMapper::set(
        &mut config.store.operation_timeout_ms,
        store.operation_timeout_ms,
    );
    OverrideMapper::set(
        &mut config.store.reconnect_backoff_ms,
        store.reconnect_backoff_ms,
    );
    OverrideMapper::set(&mut config.store.memory_max_entries, store.memory_max_entries);
    OverrideMapper::set(&mut config.store.memory_max_bytes, store.memory_max_bytes);

    for (layer, layer_overrides) in [
        (&mut config.embedding, &overrides.embedding),
        (&mut config.similarity, &overrides.similarity),
        (&mut config.query, &overrides.query),
    ] {
        OverrideMapper::set(&mut layer.enabled, layer_overrides.enabled);
        if layer_overrides.ttl_secs.is_some() {
            layer.ttl_secs = layer_overrides.ttl_secs;
        }
    }

    let pipeline = &overrides.pipeline;
    OverrideMapper::set(&mut config.pipeline.top_k, pipeline.top_k);
    OverrideMapper::set(
        &mut config.pipeline.context_max_words,
        pipeline.context_max_words,
    );
    OverrideMapper::set(&mut config.pipeline.timeout_ms, pipeline.timeout_ms);
    OverrideMapper::set_box_str(
        &mut config.pipeline.embedding_model,
        pipeline.embedding_model.as_deref(),
    );
    OverrideMapper::set(
        &mut config.pipeline.write_concurrency,
        pipeline.write_concurrency,
    );
}

struct OverrideMapper;

impl OverrideMapper {
    const fn set<T: Copy>(field: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *field = value;
        }
    }

    fn set_box_str(field: &mut Box<str>, value: Option<&str>) {
        if let Some(value) = value {
            *field = value.into();
        }
    }
}
