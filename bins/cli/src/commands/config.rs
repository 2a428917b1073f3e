//! `docrag config` handlers.

use crate::ConfigSource;
use crate::error::CliError;
use crate::format::{CliOutput, OutputFormat, OutputMode, error_output, success_output};
use docrag_infra::{ConfigRendering, load_effective_config};
use serde_json::Value;
use std::collections::BTreeMap;

/// Print the effective config after merging file, overrides and env.
pub fn run_config_show(
    mode: OutputMode,
    source: &ConfigSource,
    env: &BTreeMap<String, String>,
    rendering: ConfigRendering,
) -> Result<CliOutput, CliError> {
    let rendering = if mode.format == OutputFormat::Text {
        rendering
    } else {
        ConfigRendering::Json
    };
    let rendered = match load_effective_config(env, source.path(), source.overrides(), rendering)
    {
        Ok(rendered) => rendered,
        Err(error) => return Ok(error_output(mode, &error)),
    };
    if mode.format == OutputFormat::Text {
        let mut stdout = rendered;
        if !stdout.ends_with('\n') {
            stdout.push('\n');
        }
        return success_output(mode, "config.show", &(), || stdout);
    }
    let value: Value = serde_json::from_str(&rendered)?;
    success_output(mode, "config.show", &value, String::new)
}

/// Validate the effective config.
pub fn run_config_check(
    mode: OutputMode,
    source: &ConfigSource,
    env: &BTreeMap<String, String>,
) -> Result<CliOutput, CliError> {
    match load_effective_config(env, source.path(), source.overrides(), ConfigRendering::Json) {
        Ok(_) => success_output(
            mode,
            "config.check",
            &serde_json::json!({ "status": "ok" }),
            || "status: ok\n".to_string(),
        ),
        Err(error) => Ok(error_output(mode, &error)),
    }
}
