//! Similarity-search hits, the payload of the similarity layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Chunk text.
    pub content: Box<str>,
    /// Owning document, when the store tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Box<str>>,
    /// Similarity score; higher is closer.
    pub score: f32,
    /// Free-form chunk metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<Box<str>, Box<str>>,
}

impl SearchHit {
    /// Hit without metadata.
    pub fn new(content: impl Into<Box<str>>, document_id: Option<&str>, score: f32) -> Self {
        Self {
            content: content.into(),
            document_id: document_id.map(Into::into),
            score,
            metadata: BTreeMap::new(),
        }
    }
}
