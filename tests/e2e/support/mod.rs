//! Shared helpers for CLI end-to-end tests.
#![allow(dead_code, reason = "each suite uses a subset of the helpers")]

use std::io;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

const CACHE_ENV: [&str; 5] = ["REDIS_URL", "REDIS_TTL", "CACHE_TTL", "ENABLE_CACHING", "RUST_LOG"];

/// `docrag` with a clean cache environment.
pub fn docrag() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_docrag"));
    for key in CACHE_ENV {
        command.env_remove(key);
    }
    for (key, _) in std::env::vars() {
        if key.starts_with("DOCRAG_") {
            command.env_remove(key);
        }
    }
    command
}

/// Run `docrag` with `args`.
pub fn run(args: &[&str]) -> io::Result<Output> {
    docrag().args(args).output()
}

/// Parse stdout as one JSON document.
pub fn stdout_json(output: &Output) -> io::Result<serde_json::Value> {
    serde_json::from_slice(&output.stdout).map_err(io::Error::other)
}

/// Fresh scratch directory.
pub fn scratch_dir(label: &str) -> io::Result<PathBuf> {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("docrag-e2e-{label}-{unique}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Three-chunk corpus over two documents.
pub fn corpus_file(label: &str) -> io::Result<PathBuf> {
    let path = scratch_dir(label)?.join("corpus.json");
    std::fs::write(
        &path,
        r#"[
  {"content": "Artificial intelligence (AI) is intelligence demonstrated by machines.", "documentId": "ai"},
  {"content": "AI research studies intelligent agents that perceive their environment.", "documentId": "ai"},
  {"content": "A sourdough starter is a fermented mix of flour and water.", "documentId": "bread"}
]"#,
    )?;
    Ok(path)
}
