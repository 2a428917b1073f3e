//! # docrag-config
//!
//! Cache configuration: schema with defaults, validation, environment
//! overrides and file loading. Depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and validation.
pub mod schema;

pub use env::{CacheEnv, EnvParseError, apply_env_overrides};
pub use load::{
    load_cache_config_from_path, load_cache_config_from_sources, load_cache_config_std_env,
    to_pretty_json, to_pretty_toml,
};
pub use schema::{
    CacheConfig, ConfigSchemaError, DEFAULT_EMBEDDING_MODEL, LayerConfig, PipelineConfig,
    StoreConfig, StoreProvider, ValidatedCacheConfig, parse_cache_config_json,
    parse_cache_config_toml, validate_redis_url,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
