//! `docrag health` handler.

use crate::ConfigSource;
use crate::error::CliError;
use crate::format::{CliOutput, OutputMode, error_output, success_output};
use docrag_infra::run_health;

/// Report service health plus cache status.
pub fn run_health_command(mode: OutputMode, source: &ConfigSource) -> Result<CliOutput, CliError> {
    match run_health(source.path(), source.overrides()) {
        Ok(report) => success_output(mode, "health", &report, || {
            format!(
                "status: {}\nservice: {}\ncache: {} ({}, hit rate {})\n",
                report.status,
                report.service,
                report.cache.status,
                report.cache.backend,
                report.cache.hit_rate
            )
        }),
        Err(error) => Ok(error_output(mode, &error)),
    }
}
