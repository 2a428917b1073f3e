use docrag_domain::SearchHit;
use docrag_ports::{
    BoxFuture, EmbedBatchRequest, EmbeddingPort, EmbeddingVector, SimilaritySearchPort,
    SimilaritySearchRequest,
};
use docrag_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// One chunk of an ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CorpusChunk {
    /// Chunk text.
    pub content: Box<str>,
    /// Owning document.
    #[serde(default)]
    pub document_id: Option<Box<str>>,
    /// Free-form metadata carried into search hits.
    #[serde(default)]
    pub metadata: BTreeMap<Box<str>, Box<str>>,
}

struct IndexedChunk {
    chunk: CorpusChunk,
    vector: EmbeddingVector,
}

/// Brute-force cosine index over an in-memory corpus.
#[derive(Default)]
pub struct LocalCorpusIndex {
    chunks: RwLock<Vec<IndexedChunk>>,
    searches: AtomicU64,
}

impl LocalCorpusIndex {
    /// Empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed `chunks` with `embedder` (one batch call) and add them.
    pub async fn ingest(
        &self,
        ctx: &RequestContext,
        embedder: &dyn EmbeddingPort,
        chunks: Vec<CorpusChunk>,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = embedder.embed_batch(ctx, EmbedBatchRequest { texts }).await?;
        if vectors.len() != chunks.len() {
            return Err(ErrorEnvelope::invariant(
                ErrorCode::internal(),
                "embedder returned a different number of vectors than chunks",
            ));
        }
        let added = chunks.len();
        self.chunks.write().await.extend(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexedChunk { chunk, vector }),
        );
        Ok(added)
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// Returns true when nothing is indexed.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Search invocations so far.
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }
}

impl SimilaritySearchPort for LocalCorpusIndex {
    fn search(
        &self,
        ctx: &RequestContext,
        request: SimilaritySearchRequest,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("search.similarity")?;
            self.searches.fetch_add(1, Ordering::Relaxed);
            let chunks = self.chunks.read().await;
            let mut hits: Vec<SearchHit> = chunks
                .iter()
                .filter(|indexed| match request.doc_id.as_deref() {
                    Some(doc_id) => indexed.chunk.document_id.as_deref() == Some(doc_id),
                    None => true,
                })
                .map(|indexed| SearchHit {
                    content: indexed.chunk.content.clone(),
                    document_id: indexed.chunk.document_id.clone(),
                    score: indexed.vector.cosine_similarity(&request.vector),
                    metadata: indexed.chunk.metadata.clone(),
                })
                .collect();
            drop(chunks);
            hits.sort_by(|left, right| right.score.total_cmp(&left.score));
            hits.truncate(usize::try_from(request.k).unwrap_or(usize::MAX));
            Ok(hits)
        })
    }
}

/// Read corpus chunks from a file.
///
/// `.json` files hold an array of chunks. Any other file is treated as
/// plain text: blank-line separated paragraphs become chunks owned by a
/// document named after the file stem.
pub async fn load_corpus_file(path: &Path) -> Result<Vec<CorpusChunk>> {
    let text = tokio::fs::read_to_string(path).await.map_err(|error| {
        let code = if error.kind() == std::io::ErrorKind::NotFound {
            ErrorCode::new("corpus", "not_found")
        } else {
            ErrorCode::io()
        };
        ErrorEnvelope::unexpected(
            code,
            format!("failed to read corpus: {error}"),
            ErrorClass::NonRetriable,
        )
        .with_metadata("path", path.display().to_string())
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        return serde_json::from_str(&text).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("corpus", "invalid_json"),
                format!("invalid corpus JSON: {error}"),
            )
            .with_metadata("path", path.display().to_string())
        });
    }

    let document_id: Option<Box<str>> = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(Into::into);
    Ok(split_paragraphs(&text)
        .map(|paragraph| CorpusChunk {
            content: paragraph.into(),
            document_id: document_id.clone(),
            metadata: BTreeMap::new(),
        })
        .collect())
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split("\n\n")
        .map(|paragraph| paragraph.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|paragraph| !paragraph.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::HashEmbedding;

    fn chunk(content: &str, doc: &str) -> CorpusChunk {
        CorpusChunk {
            content: content.into(),
            document_id: Some(doc.into()),
            metadata: BTreeMap::new(),
        }
    }

    async fn indexed() -> Result<(HashEmbedding, LocalCorpusIndex)> {
        let embedder = HashEmbedding::new("local", 256)?;
        let index = LocalCorpusIndex::new();
        index
            .ingest(
                &RequestContext::new_request(),
                &embedder,
                vec![
                    chunk("Artificial intelligence (AI) is intelligence shown by machines.", "ai"),
                    chunk("Machine learning is a subfield of AI.", "ai"),
                    chunk("Sourdough bread needs a starter.", "bread"),
                ],
            )
            .await?;
        Ok((embedder, index))
    }

    #[tokio::test]
    async fn ranks_related_chunks_first() -> Result<()> {
        let (embedder, index) = indexed().await?;
        let ctx = RequestContext::new_request();
        let vector = embedder.embed(&ctx, "What is AI intelligence?".into()).await?;
        let hits = index
            .search(&ctx, SimilaritySearchRequest { vector, doc_id: None, k: 2 })
            .await?;
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.document_id.as_deref() == Some("ai")));
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(index.searches(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn document_filter_restricts_hits() -> Result<()> {
        let (embedder, index) = indexed().await?;
        let ctx = RequestContext::new_request();
        let vector = embedder.embed(&ctx, "What is AI?".into()).await?;
        let hits = index
            .search(
                &ctx,
                SimilaritySearchRequest { vector, doc_id: Some("bread".into()), k: 10 },
            )
            .await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id.as_deref(), Some("bread"));
        Ok(())
    }

    #[tokio::test]
    async fn loads_text_and_json_corpora() -> Result<(), Box<dyn std::error::Error>> {
        let dir = std::env::temp_dir().join(format!("docrag-corpus-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;

        let text_path = dir.join("handbook.txt");
        std::fs::write(&text_path, "First paragraph\nwraps here.\n\n\nSecond one.\n")?;
        let chunks = load_corpus_file(&text_path).await?;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.as_ref(), "First paragraph wraps here.");
        assert_eq!(chunks[1].document_id.as_deref(), Some("handbook"));

        let json_path = dir.join("chunks.json");
        std::fs::write(&json_path, r#"[{"content":"AI","documentId":"d1"}]"#)?;
        let chunks = load_corpus_file(&json_path).await?;
        assert_eq!(chunks, vec![chunk("AI", "d1")]);

        let missing = load_corpus_file(&dir.join("absent.json")).await;
        assert_eq!(
            missing.err().map(|error| error.code),
            Some(ErrorCode::new("corpus", "not_found"))
        );

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
