//! `docrag query` handler.

use crate::ConfigSource;
use crate::error::CliError;
use crate::format::{CliOutput, OutputMode, error_output, success_output};
use docrag_infra::{LocalQueryReport, LocalQueryRequest, run_query_local};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Arguments of `docrag query`.
#[derive(Debug, Clone)]
pub struct QueryCommandInput {
    pub question: String,
    pub doc_id: Option<String>,
    pub corpus: PathBuf,
    pub repeat: u32,
}

/// Answer a question against a local corpus through the cached pipeline.
pub fn run_query_command(
    mode: OutputMode,
    source: &ConfigSource,
    input: QueryCommandInput,
) -> Result<CliOutput, CliError> {
    let request = LocalQueryRequest {
        question: input.question.into(),
        doc_id: input.doc_id.map(Into::into),
        corpus_path: input.corpus,
        repeat: input.repeat,
    };
    match run_query_local(source.path(), source.overrides(), request) {
        Ok(report) => success_output(mode, "query", &report, || format_query_text(&report)),
        Err(error) => Ok(error_output(mode, &error)),
    }
}

fn format_query_text(report: &LocalQueryReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "answer: {}", report.answer.answer);
    let _ = writeln!(out, "backend: {}", report.backend);
    let _ = writeln!(out, "chunks: {}", report.chunks);
    let _ = writeln!(out, "runs: {}", report.runs);
    for activity in &report.layers {
        if activity.enabled {
            let _ = writeln!(
                out,
                "layer {}: ttl={}s hits={} misses={}",
                activity.layer,
                activity.ttl_secs.unwrap_or_default(),
                activity.hits,
                activity.misses
            );
        } else {
            let _ = writeln!(out, "layer {}: disabled", activity.layer);
        }
    }
    let calls = report.provider_calls;
    let _ = writeln!(
        out,
        "providerCalls: embedding={} search={} generation={}",
        calls.embedding, calls.search, calls.generation
    );
    out
}
