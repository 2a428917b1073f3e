//! Similarity search behind the similarity cache layer.

use crate::result_cache::ResultCache;
use docrag_domain::{CacheLayer, SearchHit, SimilarityFingerprint};
use docrag_ports::{EmbeddingPort, SimilaritySearchPort, SimilaritySearchRequest};
use docrag_shared::{RequestContext, Result};
use std::sync::Arc;

/// Embeds the query and searches, caching the hit list per
/// `(query, doc_id, k)`.
#[derive(Clone)]
pub struct CachedSimilaritySearch {
    embedding: Arc<dyn EmbeddingPort>,
    search: Arc<dyn SimilaritySearchPort>,
    cache: ResultCache,
}

impl CachedSimilaritySearch {
    /// `embedding` may itself be a caching wrapper.
    #[must_use]
    pub fn new(
        embedding: Arc<dyn EmbeddingPort>,
        search: Arc<dyn SimilaritySearchPort>,
        cache: ResultCache,
    ) -> Self {
        Self {
            embedding,
            search,
            cache,
        }
    }

    /// Top `k` hits for `query_text`, optionally within one document.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        query_text: &str,
        doc_id: Option<&str>,
        k: u32,
    ) -> Result<Vec<SearchHit>> {
        let fingerprint = SimilarityFingerprint::new(query_text, doc_id, k)?;
        let ttl = self.cache.layer_ttl(CacheLayer::Similarity);
        self.cache
            .get_or_compute(ctx, CacheLayer::Similarity, &fingerprint, ttl, || async {
                ctx.ensure_not_cancelled("similarity.embed")?;
                let vector = self.embedding.embed(ctx, query_text.into()).await?;
                ctx.ensure_not_cancelled("similarity.search")?;
                self.search
                    .search(
                        ctx,
                        SimilaritySearchRequest {
                            vector,
                            doc_id: fingerprint.doc_id().map(Into::into),
                            k,
                        },
                    )
                    .await
            })
            .await
    }
}
