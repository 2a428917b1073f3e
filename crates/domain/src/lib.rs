//! # docrag-domain
//!
//! Domain model for the document RAG cache:
//!
//! - **Layers** - `CacheLayer` namespaces (embedding, similarity, query)
//! - **Fingerprints** - validated per-layer request fields
//! - **Keys** - deterministic SHA-256 key derivation
//! - **Payloads** - `SearchHit`, `QueryAnswer`
//! - **Statistics** - `CacheStatistics` snapshots and hit-rate formatting
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub use docrag_shared::shared_crate_version;

pub mod answer;
pub mod fingerprint;
pub mod key;
pub mod layer;
pub mod search;
pub mod stats;

pub use answer::QueryAnswer;
pub use fingerprint::{
    EmbeddingFingerprint, FieldValue, Fingerprint, FingerprintError, QueryFingerprint,
    SimilarityFingerprint,
};
pub use key::{CacheKey, KEY_HASH_HEX_LEN, derive_key};
pub use layer::{CacheLayer, UnknownLayerError};
pub use search::SearchHit;
pub use stats::{
    CacheStatistics, StoreBackend, StoreStatus, format_bytes_human, format_hit_rate,
};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        assert!(!domain_crate_version().is_empty());
    }

    #[test]
    fn domain_depends_on_shared() {
        assert!(!shared_crate_version().is_empty());
    }
}
