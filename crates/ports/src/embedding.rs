//! Embedding boundary contract.

use crate::BoxFuture;
use docrag_shared::{RequestContext, Result};
use std::sync::Arc;

/// Dense embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    vector: Arc<[f32]>,
}

impl EmbeddingVector {
    /// Wrap a shared buffer.
    #[must_use]
    pub const fn new(vector: Arc<[f32]>) -> Self {
        Self { vector }
    }

    /// Build from an owned vector.
    #[must_use]
    pub fn from_vec(vector: Vec<f32>) -> Self {
        Self::new(Arc::from(vector))
    }

    /// Borrow the components.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    /// Number of components.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Cosine similarity with `other`; zero for mismatched or zero vectors.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.dimension() != other.dimension() {
            return 0.0;
        }
        let mut dot = 0.0f32;
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for (a, b) in self.vector.iter().zip(other.vector.iter()) {
            dot += a * b;
            left += a * a;
            right += b * b;
        }
        let norm = left.sqrt() * right.sqrt();
        if norm == 0.0 { 0.0 } else { dot / norm }
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(vector: Vec<f32>) -> Self {
        Self::from_vec(vector)
    }
}

/// Identity of an embedding provider.
///
/// `model` is part of every embedding fingerprint: switching models must
/// never serve vectors produced by the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingProviderInfo {
    /// Human-readable provider name.
    pub name: Box<str>,
    /// Model identifier.
    pub model: Box<str>,
}

/// Request to embed a single text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedRequest {
    /// Text to embed.
    pub text: Box<str>,
}

impl From<&str> for EmbedRequest {
    fn from(text: &str) -> Self {
        Self { text: text.into() }
    }
}

impl From<String> for EmbedRequest {
    fn from(text: String) -> Self {
        Self {
            text: text.into_boxed_str(),
        }
    }
}

/// Request to embed several texts at once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmbedBatchRequest {
    /// Texts to embed, in caller order.
    pub texts: Vec<Box<str>>,
}

impl From<Vec<Box<str>>> for EmbedBatchRequest {
    fn from(texts: Vec<Box<str>>) -> Self {
        Self { texts }
    }
}

impl From<Vec<String>> for EmbedBatchRequest {
    fn from(texts: Vec<String>) -> Self {
        Self {
            texts: texts.into_iter().map(String::into_boxed_str).collect(),
        }
    }
}

impl From<&[&str]> for EmbedBatchRequest {
    fn from(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|text| Box::from(*text)).collect(),
        }
    }
}

/// Boundary contract for embedding generation.
///
/// Implementations return exactly one vector per input text, in input order.
pub trait EmbeddingPort: Send + Sync {
    /// Provider identity, including the model name.
    fn provider(&self) -> &EmbeddingProviderInfo;

    /// Embed a single text.
    fn embed(
        &self,
        ctx: &RequestContext,
        request: EmbedRequest,
    ) -> BoxFuture<'_, Result<EmbeddingVector>>;

    /// Embed multiple texts.
    fn embed_batch(
        &self,
        ctx: &RequestContext,
        request: EmbedBatchRequest,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_parallel_vectors_is_one() {
        let a = EmbeddingVector::from_vec(vec![1.0, 2.0, 3.0]);
        let b = EmbeddingVector::from_vec(vec![2.0, 4.0, 6.0]);
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_handles_degenerate_input() {
        let zero = EmbeddingVector::from_vec(vec![0.0, 0.0]);
        let unit = EmbeddingVector::from_vec(vec![1.0, 0.0]);
        let short = EmbeddingVector::from_vec(vec![1.0]);
        assert!(zero.cosine_similarity(&unit).abs() < f32::EPSILON);
        assert!(unit.cosine_similarity(&short).abs() < f32::EPSILON);
    }

    #[test]
    fn batch_request_conversions_keep_order() {
        let request = EmbedBatchRequest::from(vec!["a".to_string(), "b".to_string()]);
        let texts: Vec<&str> = request.texts.iter().map(AsRef::as_ref).collect();
        assert_eq!(texts, ["a", "b"]);
    }
}
