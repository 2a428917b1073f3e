//! # docrag-ports
//!
//! Port traits for the docrag-cache hexagonal architecture.
//!
//! Defines the seams between the cache logic and the outside world: the
//! key-value store, the three expensive providers (embedding, similarity
//! search, answer generation), logging and telemetry. Depends only on
//! `domain` and `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod cache_store;
pub mod embedding;
pub mod generation;
pub mod logger;
pub mod search;
pub mod telemetry;

pub use cache_store::*;
pub use embedding::*;
pub use generation::*;
pub use logger::*;
pub use search::*;
pub use telemetry::*;

// Domain types that appear in port signatures.
pub use docrag_domain::{
    CacheKey, CacheLayer, CacheStatistics, QueryAnswer, SearchHit, StoreBackend, StoreStatus,
};

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_domain::domain_crate_version;
    use docrag_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
                continue;
            }
            if in_deps && line.starts_with("docrag-") {
                let key = line.split('=').next().unwrap_or("").trim();
                deps.push(key.split('.').next().unwrap_or("").trim().to_string());
            }
        }

        deps
    }

    #[test]
    fn ports_depends_only_on_domain_and_shared() {
        let deps = workspace_deps();
        let allowed = ["docrag-domain", "docrag-shared"];

        for dep in &deps {
            assert!(
                allowed.contains(&dep.as_str()),
                "unexpected dependency found: {dep}"
            );
        }
        for expected in allowed {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn ports_can_use_domain_and_shared() {
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
