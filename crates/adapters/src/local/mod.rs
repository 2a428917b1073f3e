//! Self-contained providers for offline runs and tests.
//!
//! Stand-ins for the remote embedding model, vector store and LLM so the
//! cached pipeline can run end to end without network access.

mod corpus;
mod embedding;
mod generator;

pub use corpus::{CorpusChunk, LocalCorpusIndex, load_corpus_file};
pub use embedding::HashEmbedding;
pub use generator::ExtractiveAnswerGenerator;
