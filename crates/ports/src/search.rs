//! Similarity-search boundary contract.

use crate::BoxFuture;
use crate::embedding::EmbeddingVector;
use docrag_domain::SearchHit;
use docrag_shared::{RequestContext, Result};

/// Nearest-neighbour lookup over stored chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilaritySearchRequest {
    /// Query embedding.
    pub vector: EmbeddingVector,
    /// Restrict hits to one document.
    pub doc_id: Option<Box<str>>,
    /// Maximum hits to return.
    pub k: u32,
}

/// Boundary contract for the vector store.
///
/// Hits come back ranked best first; at most `k` of them.
pub trait SimilaritySearchPort: Send + Sync {
    /// Run a similarity search.
    fn search(
        &self,
        ctx: &RequestContext,
        request: SimilaritySearchRequest,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>>>;
}
