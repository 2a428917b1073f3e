//! Answer-query use case: cached retrieval-augmented generation.

use crate::result_cache::ResultCache;
use crate::similarity::CachedSimilaritySearch;
use docrag_domain::{CacheLayer, QueryAnswer, QueryFingerprint};
use docrag_ports::{
    AnswerGenerationPort, GenerateRequest, LogFields, LoggerPort, TelemetryPort, layer_tags,
};
use docrag_shared::{
    ErrorCode, ErrorEnvelope, RequestContext, Result, timeout_with_context,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Retrieval and generation knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Chunks retrieved per question.
    pub top_k: u32,
    /// Words of context handed to the generator.
    pub context_max_words: u32,
    /// Budget for the whole pipeline, cache lookups included.
    pub timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            context_max_words: 200,
            timeout: Duration::from_millis(25_000),
        }
    }
}

/// Input payload for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// End-user question.
    pub question: Box<str>,
    /// Restrict retrieval to one document.
    pub doc_id: Option<Box<str>>,
    /// Extra filters that influence the answer.
    pub filters: BTreeMap<Box<str>, Box<str>>,
}

impl QueryRequest {
    /// Unscoped question without filters.
    pub fn new(question: impl Into<Box<str>>) -> Self {
        Self {
            question: question.into(),
            doc_id: None,
            filters: BTreeMap::new(),
        }
    }

    /// Scope retrieval to `doc_id`.
    #[must_use]
    pub fn with_doc_id(mut self, doc_id: impl Into<Box<str>>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }
}

/// Dependencies required by `answer_query`.
#[derive(Clone)]
pub struct AnswerQueryDeps {
    /// Cached similarity search.
    pub similarity: CachedSimilaritySearch,
    /// Language model.
    pub generator: Arc<dyn AnswerGenerationPort>,
    /// Query-layer cache.
    pub cache: ResultCache,
    /// Retrieval and generation knobs.
    pub settings: PipelineSettings,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Answer `request`, serving a cached answer when one exists.
#[tracing::instrument(
    name = "answer_query",
    skip_all,
    fields(correlation_id = %ctx.correlation_id(), top_k = deps.settings.top_k)
)]
pub async fn answer_query(
    ctx: &RequestContext,
    deps: &AnswerQueryDeps,
    request: QueryRequest,
) -> Result<QueryAnswer> {
    let started_at = Instant::now();
    let tags = layer_tags(CacheLayer::Query);
    let total_timer = deps
        .telemetry
        .as_ref()
        .map(|telemetry| telemetry.start_timer("cache.query.total", Some(&tags)));

    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            "cache.query.start",
            "Query started",
            Some(request_fields(&request, deps.settings.top_k)),
        );
    }

    let result = timeout_with_context(
        ctx,
        deps.settings.timeout,
        "answer_query",
        run_query(ctx, deps, &request),
    )
    .await;

    if let Some(timer) = total_timer.as_ref() {
        timer.stop();
    }

    match result {
        Ok(answer) => {
            if let Some(logger) = deps.logger.as_ref() {
                let mut fields = request_fields(&request, deps.settings.top_k);
                fields.insert("durationMs".into(), Value::from(duration_ms(started_at)));
                fields.insert("answerChars".into(), Value::from(answer.answer.chars().count()));
                logger.info("cache.query.completed", "Query completed", Some(fields));
            }
            Ok(answer)
        },
        Err(error) => {
            let mut fields = request_fields(&request, deps.settings.top_k);
            fields.insert("durationMs".into(), Value::from(duration_ms(started_at)));
            if error.is_cancelled() {
                if let Some(telemetry) = deps.telemetry.as_ref() {
                    telemetry.increment_counter("cache.query.aborted", 1, Some(&tags));
                }
                if let Some(logger) = deps.logger.as_ref() {
                    logger.info("cache.query.aborted", "Query aborted", Some(fields));
                }
            } else {
                if let Some(telemetry) = deps.telemetry.as_ref() {
                    telemetry.increment_counter("cache.query.failed", 1, Some(&tags));
                }
                if let Some(logger) = deps.logger.as_ref() {
                    fields.insert("errorCode".into(), Value::from(error.code.to_string()));
                    fields.insert("error".into(), Value::from(error.message.clone()));
                    logger.error("cache.query.failed", "Query failed", Some(fields));
                }
            }
            Err(error)
        },
    }
}

async fn run_query(
    ctx: &RequestContext,
    deps: &AnswerQueryDeps,
    request: &QueryRequest,
) -> Result<QueryAnswer> {
    ctx.ensure_not_cancelled("answer_query.start")?;
    if request.question.trim().is_empty() {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "question must not be blank",
        ));
    }

    let top_k = deps.settings.top_k;
    let mut fingerprint = QueryFingerprint::new(
        request.question.clone(),
        request.doc_id.as_deref(),
        top_k,
    )?;
    for (name, value) in &request.filters {
        fingerprint = fingerprint.with_filter(name, value.clone())?;
    }

    let ttl = deps.cache.layer_ttl(CacheLayer::Query);
    deps.cache
        .get_or_compute(ctx, CacheLayer::Query, &fingerprint, ttl, || {
            generate_answer(ctx, deps, request, top_k)
        })
        .await
}

async fn generate_answer(
    ctx: &RequestContext,
    deps: &AnswerQueryDeps,
    request: &QueryRequest,
    top_k: u32,
) -> Result<QueryAnswer> {
    let hits = deps
        .similarity
        .search(ctx, &request.question, request.doc_id.as_deref(), top_k)
        .await?;
    let joined = hits
        .iter()
        .map(|hit| hit.content.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    let context: Box<str> = truncate_words(&joined, deps.settings.context_max_words).into();

    ctx.ensure_not_cancelled("answer_query.generate")?;
    let generate_timer = deps.telemetry.as_ref().map(|telemetry| {
        telemetry.start_timer("cache.query.generate", Some(&layer_tags(CacheLayer::Query)))
    });
    let answer = deps
        .generator
        .generate(
            ctx,
            GenerateRequest {
                question: request.question.clone(),
                context: context.clone(),
            },
        )
        .await?;
    if let Some(timer) = generate_timer.as_ref() {
        timer.stop();
    }

    Ok(QueryAnswer { answer, context })
}

/// First `max_words` whitespace-separated words, joined by single spaces.
pub fn truncate_words(text: &str, max_words: u32) -> String {
    let limit = usize::try_from(max_words).unwrap_or(usize::MAX);
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

fn request_fields(request: &QueryRequest, top_k: u32) -> LogFields {
    let mut fields = LogFields::new();
    fields.insert(
        "questionChars".into(),
        Value::from(request.question.chars().count()),
    );
    fields.insert(
        "docId".into(),
        request
            .doc_id
            .as_deref()
            .map_or(Value::Null, |doc_id| Value::String(doc_id.to_owned())),
    );
    fields.insert("topK".into(), Value::from(top_k));
    fields.insert("filters".into(), Value::from(request.filters.len()));
    fields
}

fn duration_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}
