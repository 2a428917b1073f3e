//! Answer-generation boundary contract.

use crate::BoxFuture;
use docrag_shared::{RequestContext, Result};

/// Question plus retrieved context handed to the language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// End-user question.
    pub question: Box<str>,
    /// Retrieved context, already truncated.
    pub context: Box<str>,
}

impl GenerateRequest {
    /// Render the grounded-answer prompt.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!(
            "Answer the question based only on the context below. Context: {}\n\nQuestion: {}\n\nAnswer:",
            self.context, self.question
        )
    }
}

/// Boundary contract for the language model.
pub trait AnswerGenerationPort: Send + Sync {
    /// Produce an answer for `request`.
    fn generate(
        &self,
        ctx: &RequestContext,
        request: GenerateRequest,
    ) -> BoxFuture<'_, Result<Box<str>>>;
}
