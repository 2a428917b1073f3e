//! Output format helpers for CLI commands.

use crate::error::{CliError, ExitCode};
use clap::{Args, ValueEnum};
use docrag_shared::{ErrorEnvelope, ErrorKind, redact_if_secret};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Output format choices for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-friendly text output.
    Text,
    /// Machine-friendly JSON output.
    Json,
    /// Line-delimited JSON (NDJSON) output.
    Ndjson,
}

/// Output-related CLI flags.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output format for command responses.
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputFormat>,
    /// Emit machine-friendly defaults (NDJSON output, no progress).
    #[arg(long, global = true)]
    pub agent: bool,
    /// Suppress progress output on stderr.
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// Output mode derived from CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub format: OutputFormat,
    pub no_progress: bool,
}

impl OutputMode {
    /// Build output mode from CLI flags.
    #[must_use]
    pub const fn from_args(args: &OutputArgs) -> Self {
        let format = match (args.output, args.agent) {
            (Some(value), _) => value,
            (None, true) => OutputFormat::Ndjson,
            (None, false) => OutputFormat::Text,
        };
        Self {
            format,
            no_progress: args.agent || args.no_progress,
        }
    }
}

/// Rendered command result.
#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: ExitCode,
}

/// Render a successful command.
///
/// JSON prints `payload` as-is; NDJSON wraps it in a one-line summary record.
pub fn success_output<T: Serialize>(
    mode: OutputMode,
    kind: &str,
    payload: &T,
    text: impl FnOnce() -> String,
) -> Result<CliOutput, CliError> {
    let stdout = match mode.format {
        OutputFormat::Text => text(),
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(payload)?;
            out.push('\n');
            out
        },
        OutputFormat::Ndjson => {
            let record = json!({
                "type": "summary",
                "status": "ok",
                "kind": kind,
                "data": payload,
            });
            let mut out = serde_json::to_string(&record)?;
            out.push('\n');
            out
        },
    };
    let mut stderr = String::new();
    log_info(&mut stderr, &format!("{kind} completed"), mode.no_progress);
    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorView<'a> {
    code: String,
    message: &'a str,
    kind: ErrorKind,
    retriable: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    meta: BTreeMap<&'a str, String>,
}

impl<'a> ErrorView<'a> {
    fn new(error: &'a ErrorEnvelope) -> Self {
        Self {
            code: error.code.to_string(),
            message: &error.message,
            kind: error.kind,
            retriable: error.class.is_retriable(),
            meta: error
                .metadata
                .iter()
                .map(|(key, value)| (key.as_str(), redact_if_secret(key, value)))
                .collect(),
        }
    }
}

/// Render a failed command; the exit code follows the error kind.
#[must_use]
pub fn error_output(mode: OutputMode, error: &ErrorEnvelope) -> CliOutput {
    let view = ErrorView::new(error);
    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);

    let stdout = match mode.format {
        OutputFormat::Text => format_error_text(&view),
        OutputFormat::Json => {
            let payload = json!({ "status": "error", "error": view });
            // This is a CLI boundary, so JSON serialization errors are internal.
            let mut out = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
                "{\"status\":\"error\",\"error\":{\"code\":\"core:internal\"}}".to_string()
            });
            out.push('\n');
            out
        },
        OutputFormat::Ndjson => {
            let payload = json!({ "type": "error", "status": "error", "error": view });
            let mut out = serde_json::to_string(&payload).unwrap_or_else(|_| {
                "{\"type\":\"error\",\"status\":\"error\"}".to_string()
            });
            out.push('\n');
            out
        },
    };

    CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::for_envelope(error),
    }
}

fn format_error_text(error: &ErrorView<'_>) -> String {
    let mut out = String::new();
    out.push_str("status: error\n");
    out.push_str(&format!("code: {}\n", error.code));
    out.push_str(&format!("message: {}\n", error.message));
    out.push_str(&format!("kind: {}\n", error.kind));
    if !error.meta.is_empty() {
        out.push_str("meta:\n");
        for (key, value) in &error.meta {
            out.push_str(&format!("  {key}: {value}\n"));
        }
    }
    out
}

fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

/// Stable `key: value` rendering of a JSON object, used by text output.
#[must_use]
pub fn key_value_lines(value: &Value) -> String {
    let mut out = String::new();
    if let Value::Object(map) = value {
        for (key, value) in map {
            let rendered = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!("{key}: {rendered}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_shared::ErrorCode;

    const JSON: OutputMode = OutputMode {
        format: OutputFormat::Json,
        no_progress: true,
    };

    #[test]
    fn agent_defaults_to_ndjson_without_progress() {
        let mode = OutputMode::from_args(&OutputArgs {
            output: None,
            agent: true,
            no_progress: false,
        });
        assert_eq!(mode.format, OutputFormat::Ndjson);
        assert!(mode.no_progress);
    }

    #[test]
    fn error_metadata_is_redacted() -> Result<(), Box<dyn std::error::Error>> {
        let error = ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad")
            .with_metadata("password", "hunter2")
            .with_metadata("path", "/tmp/corpus.json");
        let output = error_output(JSON, &error);
        assert_eq!(output.exit_code, ExitCode::InvalidInput);

        let value: Value = serde_json::from_str(&output.stdout)?;
        assert_eq!(value["error"]["code"], "core:invalid_input");
        assert_ne!(value["error"]["meta"]["password"], "hunter2");
        assert_eq!(value["error"]["meta"]["path"], "/tmp/corpus.json");
        Ok(())
    }

    #[test]
    fn ndjson_success_is_one_line() -> Result<(), CliError> {
        let mode = OutputMode {
            format: OutputFormat::Ndjson,
            no_progress: true,
        };
        let output = success_output(mode, "clear", &json!({"removed": 3}), String::new)?;
        assert_eq!(output.stdout.lines().count(), 1);
        assert!(output.stdout.contains("\"kind\":\"clear\""));
        assert!(output.stderr.is_empty());
        Ok(())
    }

    #[test]
    fn key_value_lines_render_scalars_plainly() {
        let text = key_value_lines(&json!({"backend": "memory", "removed": 2}));
        assert_eq!(text, "backend: memory\nremoved: 2\n");
    }
}
