//! `docrag cache` handlers.

use crate::ConfigSource;
use crate::error::CliError;
use crate::format::{CliOutput, OutputMode, error_output, key_value_lines, success_output};
use docrag_domain::{CacheLayer, CacheStatistics};
use docrag_infra::{run_cache_clear, run_cache_invalidate, run_cache_stats};

/// Print store statistics.
pub fn run_cache_stats_command(
    mode: OutputMode,
    source: &ConfigSource,
) -> Result<CliOutput, CliError> {
    match run_cache_stats(source.path(), source.overrides()) {
        Ok(stats) => success_output(mode, "cache.stats", &stats, || format_stats_text(&stats)),
        Err(error) => Ok(error_output(mode, &error)),
    }
}

/// Clear a layer or the whole cache.
pub fn run_cache_clear_command(
    mode: OutputMode,
    source: &ConfigSource,
    layer: Option<CacheLayer>,
) -> Result<CliOutput, CliError> {
    match run_cache_clear(source.path(), source.overrides(), layer) {
        Ok(report) => success_output(mode, "cache.clear", &report, || {
            format!("scope: {}\nremoved: {}\n", report.scope, report.removed)
        }),
        Err(error) => Ok(error_output(mode, &error)),
    }
}

/// Invalidate after new content for a document was ingested.
pub fn run_cache_invalidate_command(
    mode: OutputMode,
    source: &ConfigSource,
    doc_id: &str,
) -> Result<CliOutput, CliError> {
    match run_cache_invalidate(source.path(), source.overrides(), doc_id) {
        Ok(report) => success_output(mode, "cache.invalidate", &report, || {
            let layers: Vec<&str> = report.layers.iter().map(|layer| layer.as_str()).collect();
            format!(
                "docId: {}\nlayers: {}\nremoved: {}\n",
                report.doc_id,
                layers.join(", "),
                report.removed
            )
        }),
        Err(error) => Ok(error_output(mode, &error)),
    }
}

fn format_stats_text(stats: &CacheStatistics) -> String {
    serde_json::to_value(stats).map_or_else(
        |_| format!("status: {}\nbackend: {}\n", stats.status, stats.backend),
        |value| key_value_lines(&value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_domain::StoreBackend;

    #[test]
    fn stats_text_lists_every_reported_field() {
        let text = format_stats_text(&CacheStatistics::connected(StoreBackend::Memory, 3, 1));
        assert!(text.contains("status: connected\n"));
        assert!(text.contains("backend: memory\n"));
        assert!(text.contains("hitRate: 75.0%\n"));
        assert!(!text.contains("error"));
    }
}
