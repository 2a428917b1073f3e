//! Caching decorators over provider ports.

mod embedding;

pub use embedding::CachingEmbedding;
