//! Integration tests for loading config files from disk.

use docrag_config::{CacheEnv, StoreProvider, load_cache_config_from_path, to_pretty_toml};
use docrag_domain::CacheLayer;
use docrag_shared::ErrorCode;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_file(name: &str, contents: &str) -> Result<PathBuf, Box<dyn Error>> {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    let dir = std::env::temp_dir().join(format!("docrag-config-{nanos}"));
    fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

#[test]
fn toml_file_loads_with_defaults_for_missing_fields() -> Result<(), Box<dyn Error>> {
    let path = temp_file(
        "cache.toml",
        r#"
defaultTtlSecs = 1800

[store]
provider = "redis"
redisUrl = "redis://localhost:6379/0"
keyNamespace = "docrag"

[query]
ttlSecs = 120
"#,
    )?;

    let config = load_cache_config_from_path(Some(&path), None, &CacheEnv::default())?;
    assert_eq!(config.store.resolved_provider(), StoreProvider::Redis);
    assert_eq!(config.store.key_namespace.as_ref(), "docrag");
    assert_eq!(config.ttl_secs(CacheLayer::Query), 120);
    assert_eq!(config.ttl_secs(CacheLayer::Embedding), 86_400);
    assert_eq!(config.pipeline.top_k, 10);
    Ok(())
}

#[test]
fn json_file_and_env_merge() -> Result<(), Box<dyn Error>> {
    let path = temp_file("cache.json", r#"{ "enabled": true, "query": { "enabled": true } }"#)?;
    let env = CacheEnv {
        query_enabled: Some(false),
        ..CacheEnv::default()
    };

    let config = load_cache_config_from_path(Some(&path), None, &env)?;
    assert!(!config.layer_enabled(CacheLayer::Query));
    assert!(config.layer_enabled(CacheLayer::Similarity));
    Ok(())
}

#[test]
fn missing_file_has_stable_code() {
    let path = std::env::temp_dir().join("docrag-config-does-not-exist.toml");
    let error = load_cache_config_from_path(Some(&path), None, &CacheEnv::default()).err();
    assert_eq!(
        error.map(|error| error.code),
        Some(ErrorCode::new("config", "config_file_not_found"))
    );
}

#[test]
fn rendered_toml_loads_back() -> Result<(), Box<dyn Error>> {
    let defaults = load_cache_config_from_path(None, None, &CacheEnv::default())?;
    let rendered = to_pretty_toml(defaults.as_ref())?;
    let path = temp_file("roundtrip.toml", &rendered)?;
    let reloaded = load_cache_config_from_path(Some(&path), None, &CacheEnv::default())?;
    assert_eq!(reloaded, defaults);
    Ok(())
}
