//! # docrag-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Store selection and cache wiring.
pub mod cache_runtime;
/// Local CLI orchestration helpers.
pub mod cli_local;
/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Logger and telemetry selection.
pub mod observability;

pub use cache_runtime::{CacheRuntime, build_cache_store, cache_policy, pipeline_settings};
pub use cli_local::{
    ClearReport, HealthReport, InvalidateReport, LayerActivity, LocalQueryReport,
    LocalQueryRequest, ProviderCalls, SERVICE_NAME, clear_cache, health, invalidate_cache,
    query_local, run_cache_clear, run_cache_invalidate, run_cache_stats, run_health,
    run_query_local,
};
pub use config_check::{ConfigRendering, load_effective_config, load_effective_config_json};
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use observability::{LogFormat, Observability, parse_log_level};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
