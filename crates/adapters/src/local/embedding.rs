use docrag_ports::{
    BoxFuture, EmbedBatchRequest, EmbedRequest, EmbeddingPort, EmbeddingProviderInfo,
    EmbeddingVector,
};
use docrag_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Deterministic bag-of-words embedder.
///
/// Each lowercase token is hashed into one of `dimension` buckets with a
/// signed weight; the result is L2-normalized. Texts sharing words land
/// close together, which is enough for a meaningful local similarity search.
#[derive(Debug)]
pub struct HashEmbedding {
    info: EmbeddingProviderInfo,
    dimension: usize,
    calls: AtomicU64,
}

impl HashEmbedding {
    /// Embedder reporting `model` as its model name.
    pub fn new(model: &str, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "embedding dimension must be positive",
            ));
        }
        if model.trim().is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "embedding model name must be non-empty",
            ));
        }
        Ok(Self {
            info: EmbeddingProviderInfo {
                name: "local-hash".into(),
                model: model.into(),
            },
            dimension,
            calls: AtomicU64::new(0),
        })
    }

    /// Provider invocations so far (one per `embed` or `embed_batch`).
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn vector_for(&self, text: &str) -> EmbeddingVector {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let Some(bucket_bytes) = digest.first_chunk::<8>() else {
                continue;
            };
            let bucket = u64::from_le_bytes(*bucket_bytes) % self.dimension as u64;
            let sign = if digest.get(8).is_some_and(|byte| byte & 1 == 1) { -1.0 } else { 1.0 };
            if let Some(slot) = usize::try_from(bucket).ok().and_then(|index| vector.get_mut(index)) {
                *slot += sign;
            }
        }
        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        EmbeddingVector::from_vec(vector)
    }
}

/// Lowercase alphanumeric tokens.
pub(crate) fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

impl EmbeddingPort for HashEmbedding {
    fn provider(&self) -> &EmbeddingProviderInfo {
        &self.info
    }

    fn embed(
        &self,
        ctx: &RequestContext,
        request: EmbedRequest,
    ) -> BoxFuture<'_, Result<EmbeddingVector>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("embedding.embed")?;
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.vector_for(&request.text))
        })
    }

    fn embed_batch(
        &self,
        ctx: &RequestContext,
        request: EmbedBatchRequest,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("embedding.embed_batch")?;
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(request
                .texts
                .iter()
                .map(|text| self.vector_for(text))
                .collect())
        })
    }
}
