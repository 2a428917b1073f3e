//! Request fingerprints: the semantic fields that determine a cache key.
//!
//! Each layer has its own fingerprint type. Constructors reject incomplete
//! input so that key derivation itself can never fail. Volatile request data
//! (timestamps, request ids) has no place here.

use docrag_shared::ErrorEnvelope;
use std::collections::BTreeMap;
use std::fmt;

/// A single canonical field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// UTF-8 text, hashed byte for byte.
    Text(&'a str),
    /// Unsigned integer parameter.
    Number(u64),
    /// Optional field that was not supplied.
    Absent,
}

/// Canonical view of a fingerprint, consumed by the key deriver.
pub trait Fingerprint {
    /// Fields in their fixed, documented order.
    fn canonical_fields(&self) -> Vec<(&'static str, FieldValue<'_>)>;
}

/// Validation failures raised while building a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// Model name is empty after trimming.
    BlankModel,
    /// Query or question is empty after trimming.
    BlankQuery,
    /// Result count is zero.
    ZeroResultCount,
    /// A document scope was given but is blank.
    BlankDocumentId,
    /// A filter name is blank.
    BlankFilterKey,
}

impl FingerprintError {
    /// Name of the offending field.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::BlankModel => "model",
            Self::BlankQuery => "query",
            Self::ZeroResultCount => "k",
            Self::BlankDocumentId => "doc_id",
            Self::BlankFilterKey => "filters",
        }
    }
}

impl fmt::Display for FingerprintError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankModel => formatter.write_str("model name must be non-empty"),
            Self::BlankQuery => formatter.write_str("query text must be non-empty"),
            Self::ZeroResultCount => formatter.write_str("result count k must be at least 1"),
            Self::BlankDocumentId => formatter.write_str("document id must be non-empty when set"),
            Self::BlankFilterKey => formatter.write_str("filter names must be non-empty"),
        }
    }
}

impl std::error::Error for FingerprintError {}

impl From<FingerprintError> for ErrorEnvelope {
    fn from(error: FingerprintError) -> Self {
        Self::invalid_fingerprint(error.to_string()).with_metadata("field", error.field())
    }
}

fn non_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

fn normalize_doc_id(doc_id: Option<&str>) -> Result<Option<Box<str>>, FingerprintError> {
    match doc_id {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(FingerprintError::BlankDocumentId);
            }
            Ok(Some(trimmed.into()))
        },
    }
}

/// Embedding layer fingerprint: `(text, model_name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingFingerprint {
    text: Box<str>,
    model: Box<str>,
}

impl EmbeddingFingerprint {
    /// Build from the text to embed and the model identifier. Any text is
    /// accepted, including the empty string.
    pub fn new(text: impl Into<Box<str>>, model: impl AsRef<str>) -> Result<Self, FingerprintError> {
        let text = text.into();
        let model = model.as_ref().trim();
        if model.is_empty() {
            return Err(FingerprintError::BlankModel);
        }
        Ok(Self {
            text,
            model: model.into(),
        })
    }

    /// Text being embedded.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Fingerprint for EmbeddingFingerprint {
    fn canonical_fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("text", FieldValue::Text(&self.text)),
            ("model", FieldValue::Text(&self.model)),
        ]
    }
}

/// Similarity layer fingerprint: `(query_text, doc_id_or_none, k)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityFingerprint {
    query: Box<str>,
    doc_id: Option<Box<str>>,
    k: u32,
}

impl SimilarityFingerprint {
    /// Build from the query text, optional document scope and result count.
    pub fn new(
        query: impl Into<Box<str>>,
        doc_id: Option<&str>,
        k: u32,
    ) -> Result<Self, FingerprintError> {
        let query = query.into();
        if !non_blank(&query) {
            return Err(FingerprintError::BlankQuery);
        }
        if k == 0 {
            return Err(FingerprintError::ZeroResultCount);
        }
        Ok(Self {
            query,
            doc_id: normalize_doc_id(doc_id)?,
            k,
        })
    }

    /// Query text.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Document scope, if any.
    #[must_use]
    pub fn doc_id(&self) -> Option<&str> {
        self.doc_id.as_deref()
    }

    /// Number of hits requested.
    #[must_use]
    pub const fn k(&self) -> u32 {
        self.k
    }
}

impl Fingerprint for SimilarityFingerprint {
    fn canonical_fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("query", FieldValue::Text(&self.query)),
            (
                "doc_id",
                self.doc_id.as_deref().map_or(FieldValue::Absent, FieldValue::Text),
            ),
            ("k", FieldValue::Number(u64::from(self.k))),
        ]
    }
}

/// Query layer fingerprint: `(question, doc_id_or_none, k, other_filters)`.
///
/// Filters are kept sorted by name so insertion order never affects the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFingerprint {
    question: Box<str>,
    doc_id: Option<Box<str>>,
    k: u32,
    filters: BTreeMap<Box<str>, Box<str>>,
}

impl QueryFingerprint {
    /// Build from the question, optional document scope and result count.
    pub fn new(
        question: impl Into<Box<str>>,
        doc_id: Option<&str>,
        k: u32,
    ) -> Result<Self, FingerprintError> {
        let question = question.into();
        if !non_blank(&question) {
            return Err(FingerprintError::BlankQuery);
        }
        if k == 0 {
            return Err(FingerprintError::ZeroResultCount);
        }
        Ok(Self {
            question,
            doc_id: normalize_doc_id(doc_id)?,
            k,
            filters: BTreeMap::new(),
        })
    }

    /// Add an extra filter that influences the answer.
    pub fn with_filter(
        mut self,
        name: impl AsRef<str>,
        value: impl Into<Box<str>>,
    ) -> Result<Self, FingerprintError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(FingerprintError::BlankFilterKey);
        }
        self.filters.insert(name.into(), value.into());
        Ok(self)
    }

    /// Question text.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Document scope, if any.
    #[must_use]
    pub fn doc_id(&self) -> Option<&str> {
        self.doc_id.as_deref()
    }

    /// Number of chunks retrieved for context.
    #[must_use]
    pub const fn k(&self) -> u32 {
        self.k
    }

    /// Extra filters, sorted by name.
    #[must_use]
    pub const fn filters(&self) -> &BTreeMap<Box<str>, Box<str>> {
        &self.filters
    }
}

impl Fingerprint for QueryFingerprint {
    fn canonical_fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        let mut fields = vec![
            ("question", FieldValue::Text(&self.question)),
            (
                "doc_id",
                self.doc_id.as_deref().map_or(FieldValue::Absent, FieldValue::Text),
            ),
            ("k", FieldValue::Number(u64::from(self.k))),
            ("filters", FieldValue::Number(self.filters.len() as u64)),
        ];
        for (name, value) in &self.filters {
            fields.push(("filter.name", FieldValue::Text(name)));
            fields.push(("filter.value", FieldValue::Text(value)));
        }
        fields
    }
}
