use super::embedding::tokens;
use docrag_ports::{AnswerGenerationPort, BoxFuture, GenerateRequest};
use docrag_shared::{RequestContext, Result};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

const NO_ANSWER: &str = "I don't know based on the provided context.";

/// Answers with the context sentence that shares the most words with the
/// question. Deterministic, so cached and fresh answers compare equal.
#[derive(Debug, Default)]
pub struct ExtractiveAnswerGenerator {
    calls: AtomicU64,
}

impl ExtractiveAnswerGenerator {
    /// New generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation invocations so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

fn best_sentence<'a>(question: &str, context: &'a str) -> Option<&'a str> {
    let wanted: BTreeSet<String> = tokens(question).filter(|token| token.len() > 1).collect();
    let mut best: Option<(usize, &'a str)> = None;
    for sentence in context.split_inclusive(['.', '!', '?', '\n']).map(str::trim) {
        let overlap = tokens(sentence).filter(|token| wanted.contains(token)).count();
        // Strictly greater: the earliest sentence wins ties.
        if overlap > 0 && best.is_none_or(|(top, _)| overlap > top) {
            best = Some((overlap, sentence));
        }
    }
    best.map(|(_, sentence)| sentence)
}

impl AnswerGenerationPort for ExtractiveAnswerGenerator {
    fn generate(
        &self,
        ctx: &RequestContext,
        request: GenerateRequest,
    ) -> BoxFuture<'_, Result<Box<str>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("generation.generate")?;
            self.calls.fetch_add(1, Ordering::Relaxed);
            let answer = best_sentence(&request.question, &request.context).unwrap_or(NO_ANSWER);
            Ok(answer.into())
        })
    }
}
