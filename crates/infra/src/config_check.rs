//! Config loading helpers for CLI surfaces.

use crate::InfraResult;
use docrag_config::{CacheEnv, load_cache_config_from_path, to_pretty_json, to_pretty_toml};
use docrag_shared::ErrorEnvelope;
use std::collections::BTreeMap;
use std::path::Path;

/// Serialization used by `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigRendering {
    /// Pretty JSON.
    #[default]
    Json,
    /// Pretty TOML.
    Toml,
}

/// Load and validate the effective config, returning deterministic pretty JSON.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    load_effective_config(env, config_path, overrides_json, ConfigRendering::Json)
}

/// Load and validate the effective config in the requested rendering.
pub fn load_effective_config(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    rendering: ConfigRendering,
) -> InfraResult<String> {
    let env = CacheEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    let config = load_cache_config_from_path(config_path, overrides_json, &env)?;
    match rendering {
        ConfigRendering::Json => to_pretty_json(&config),
        ConfigRendering::Toml => to_pretty_toml(&config),
    }
}
