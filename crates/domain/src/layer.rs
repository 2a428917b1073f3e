//! Cache layers and their key namespaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three cache namespaces.
///
/// The declaration order matches the expected TTL ordering: embeddings live
/// longest, full query answers go stale first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLayer {
    /// Embedding vectors keyed by `(text, model)`.
    Embedding,
    /// Similarity-search hits keyed by `(query, doc_id, k)`.
    Similarity,
    /// Full answers keyed by `(question, doc_id, k, filters)`.
    Query,
}

impl CacheLayer {
    /// Every layer, in TTL order.
    pub const ALL: [Self; 3] = [Self::Embedding, Self::Similarity, Self::Query];

    /// Layers invalidated when new documents are ingested.
    pub const INGEST_SENSITIVE: [Self; 2] = [Self::Query, Self::Similarity];

    /// Stable lowercase name, also the key prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Similarity => "similarity",
            Self::Query => "query",
        }
    }

    /// Prefix shared by every key of this layer (`"query:"`).
    #[must_use]
    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::Embedding => "embedding:",
            Self::Similarity => "similarity:",
            Self::Query => "query:",
        }
    }

    /// Glob pattern matching every key of this layer (`"query:*"`).
    #[must_use]
    pub fn key_pattern(self) -> String {
        format!("{}*", self.key_prefix())
    }

    /// Returns true when `key` belongs to this layer.
    #[must_use]
    pub fn owns_key(self, key: &str) -> bool {
        key.starts_with(self.key_prefix())
    }
}

impl fmt::Display for CacheLayer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown layer name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLayerError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for UnknownLayerError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "unknown cache layer `{}` (expected embedding, similarity or query)",
            self.input
        )
    }
}

impl std::error::Error for UnknownLayerError {}

impl FromStr for CacheLayer {
    type Err = UnknownLayerError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "embedding" | "embeddings" => Ok(Self::Embedding),
            "similarity" => Ok(Self::Similarity),
            "query" | "queries" => Ok(Self::Query),
            _ => Err(UnknownLayerError {
                input: input.to_string(),
            }),
        }
    }
}
