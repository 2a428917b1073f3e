//! # docrag-app
//!
//! Cache use cases: the read-through result cache, cached similarity
//! search, the answer-query pipeline and cache administration.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod admin;
pub mod answer_query;
pub mod result_cache;
pub mod similarity;

#[cfg(test)]
mod test_support;

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use admin::CacheAdmin;
pub use answer_query::{
    AnswerQueryDeps, PipelineSettings, QueryRequest, answer_query, truncate_words,
};
pub use result_cache::{CachePolicy, LayerPolicy, ResultCache};
pub use similarity::CachedSimilaritySearch;

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_domain::domain_crate_version;
    use docrag_ports::ports_crate_version;
    use docrag_shared::shared_crate_version;

    #[test]
    fn app_crate_compiles() {
        assert!(!app_crate_version().is_empty());
    }

    #[test]
    fn app_can_use_ports_domain_shared() {
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
