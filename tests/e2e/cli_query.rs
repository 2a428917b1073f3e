//! CLI end-to-end tests for the cached query pipeline.

#[path = "support/mod.rs"]
mod support;

use std::io;
use support::{corpus_file, run, stdout_json};

fn layer<'a>(report: &'a serde_json::Value, name: &str) -> Option<&'a serde_json::Value> {
    report["layers"]
        .as_array()
        .and_then(|layers| layers.iter().find(|layer| layer["layer"] == name))
}

#[test]
fn second_run_is_answered_from_cache() -> io::Result<()> {
    let corpus = corpus_file("repeat")?;
    let corpus = corpus.to_string_lossy();
    let output = run(&[
        "query",
        "What is AI?",
        "--corpus",
        &corpus,
        "--repeat",
        "2",
        "--output",
        "json",
    ])?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report = stdout_json(&output)?;
    assert_eq!(report["backend"], "memory");
    assert_eq!(report["runs"], 2);
    assert_eq!(report["providerCalls"]["embedding"], 1);
    assert_eq!(report["providerCalls"]["generation"], 1);
    let query = layer(&report, "query").ok_or_else(|| io::Error::other("missing query layer"))?;
    assert_eq!(query["hits"], 1);
    assert_eq!(query["misses"], 1);
    assert!(
        report["answer"]
            .as_str()
            .is_some_and(|answer| answer.contains("intelligence"))
    );
    Ok(())
}

#[test]
fn disabled_query_layer_regenerates_but_reuses_hits() -> io::Result<()> {
    let corpus = corpus_file("no-query-layer")?;
    let corpus = corpus.to_string_lossy();
    let output = support::docrag()
        .env("DOCRAG_CACHE_QUERY_ENABLED", "false")
        .args([
            "query",
            "What is AI?",
            "--corpus",
            &corpus,
            "--repeat",
            "2",
            "--output",
            "json",
        ])
        .output()?;
    assert!(output.status.success());

    let report = stdout_json(&output)?;
    assert_eq!(report["providerCalls"]["generation"], 2);
    assert_eq!(report["providerCalls"]["search"], 1);
    let similarity =
        layer(&report, "similarity").ok_or_else(|| io::Error::other("missing layer"))?;
    assert_eq!(similarity["hits"], 1);
    let query = layer(&report, "query").ok_or_else(|| io::Error::other("missing layer"))?;
    assert_eq!(query["enabled"], false);
    Ok(())
}

#[test]
fn blank_question_is_an_input_error() -> io::Result<()> {
    let corpus = corpus_file("blank")?;
    let output = run(&["query", "   ", "--corpus", &corpus.to_string_lossy(), "--agent"])?;
    assert_eq!(output.status.code(), Some(2));
    let record: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(io::Error::other)?;
    assert_eq!(record["type"], "error");
    assert_eq!(record["error"]["code"], "core:invalid_input");
    Ok(())
}

#[test]
fn missing_corpus_exits_with_io_code() -> io::Result<()> {
    let missing = support::scratch_dir("missing")?.join("absent.json");
    let output = run(&["query", "What is AI?", "--corpus", &missing.to_string_lossy()])?;
    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("code: corpus:not_found"));
    Ok(())
}
