//! CLI end-to-end tests for cache administration and health.

#[path = "support/mod.rs"]
mod support;

use std::io;
use support::{run, stdout_json};

#[test]
fn stats_report_an_empty_memory_store() -> io::Result<()> {
    let output = run(&["cache", "stats", "--output", "json"])?;
    assert!(output.status.success());

    let stats = stdout_json(&output)?;
    assert_eq!(stats["status"], "connected");
    assert_eq!(stats["backend"], "memory");
    assert_eq!(stats["keyspaceHits"], 0);
    assert_eq!(stats["hitRate"], "0.0%");
    Ok(())
}

#[test]
fn disabled_caching_reports_disabled_store() -> io::Result<()> {
    let output = support::docrag()
        .env("ENABLE_CACHING", "false")
        .args(["cache", "stats", "--output", "json"])
        .output()?;
    assert!(output.status.success());
    let stats = stdout_json(&output)?;
    assert_eq!(stats["status"], "disabled");
    assert_eq!(stats["backend"], "none");
    Ok(())
}

#[test]
fn clear_reports_scope_and_count() -> io::Result<()> {
    let output = run(&["cache", "clear", "--layer", "similarity", "--output", "json"])?;
    assert!(output.status.success());
    let report = stdout_json(&output)?;
    assert_eq!(report["scope"], "similarity");
    assert_eq!(report["removed"], 0);

    let output = run(&["cache", "clear", "--output", "text", "--no-progress"])?;
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "scope: all\nremoved: 0\n");
    assert!(output.stderr.is_empty());
    Ok(())
}

#[test]
fn invalidate_requires_a_document() -> io::Result<()> {
    let output = run(&["cache", "invalidate", "--doc-id", "  ", "--output", "json"])?;
    assert_eq!(output.status.code(), Some(2));
    let error = stdout_json(&output)?;
    assert_eq!(error["status"], "error");
    assert_eq!(error["error"]["code"], "core:invalid_input");

    let output = run(&["cache", "invalidate", "--doc-id", "doc-7", "--agent"])?;
    assert!(output.status.success());
    let line = String::from_utf8_lossy(&output.stdout);
    assert_eq!(line.lines().count(), 1);
    let record: serde_json::Value = serde_json::from_str(line.trim()).map_err(io::Error::other)?;
    assert_eq!(record["kind"], "cache.invalidate");
    assert_eq!(record["data"]["docId"], "doc-7");
    assert_eq!(record["data"]["layers"], serde_json::json!(["query", "similarity"]));
    Ok(())
}

#[test]
fn health_includes_cache_status() -> io::Result<()> {
    let output = run(&["health", "--output", "json"])?;
    assert!(output.status.success());
    let health = stdout_json(&output)?;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "document-rag-backend");
    assert_eq!(health["cache"]["status"], "connected");
    Ok(())
}

#[test]
fn unreachable_redis_degrades_instead_of_failing() -> io::Result<()> {
    let output = support::docrag()
        .env("REDIS_URL", "redis://127.0.0.1:1/0")
        .env("DOCRAG_CACHE_OP_TIMEOUT_MS", "200")
        .args(["health", "--output", "json"])
        .output()?;
    assert!(output.status.success());
    let health = stdout_json(&output)?;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["cache"]["status"], "disconnected");
    assert_eq!(health["cache"]["backend"], "redis");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cache.store.stats_failed"), "{stderr}");
    Ok(())
}
