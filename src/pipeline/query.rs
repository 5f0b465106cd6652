use crate::complete::{build_prompt, Completer};
use crate::config::QueryConfig;
use crate::embed::{embed_all, Embedder};
use crate::error::{Error, Result};
use crate::meta::{QueryRecord, QueryRepository, QueryStatus};
use crate::store::{CollectionSpec, SearchFilter, SearchResult, VectorIndex};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Answer given when retrieval finds nothing to ground on
pub const NO_CONTEXT_RESPONSE: &str =
    "I could not find any relevant textbook content for this question.";

/// Accepted feedback scores: -1 (thumbs down) through 5 stars
pub const FEEDBACK_RANGE: RangeInclusive<i32> = -1..=5;

/// Source restriction for retrieval; set fields are AND-ed
pub type SourceFilter = SearchFilter;

/// A question to answer against the indexed content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,
    #[serde(default)]
    pub source_filter: Option<SourceFilter>,
    /// Defaults to `query.default_k`
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Passage the reader had selected
    #[serde(default)]
    pub context_text: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            ..Default::default()
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_filter(mut self, filter: SourceFilter) -> Self {
        self.source_filter = Some(filter);
        self
    }

    /// Check the request and resolve its top-k
    pub fn validate(&self, settings: &QueryConfig) -> Result<usize> {
        if self.query_text.trim().is_empty() {
            return Err(Error::InvalidRequest("query_text must not be empty".to_string()));
        }

        let top_k = self.top_k.unwrap_or(settings.default_k);
        if top_k == 0 || top_k > settings.max_k {
            return Err(Error::InvalidRequest(format!(
                "top_k must be between 1 and {}, got {}",
                settings.max_k, top_k
            )));
        }
        Ok(top_k)
    }

    fn active_filter(&self) -> Option<&SourceFilter> {
        self.source_filter.as_ref().filter(|f| !f.is_empty())
    }
}

/// Embed, retrieve and synthesize, recording each step
pub struct QueryPipeline {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    repository: Arc<dyn QueryRepository>,
    collection: CollectionSpec,
    settings: QueryConfig,
    ensured: OnceCell<()>,
}

impl QueryPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        repository: Arc<dyn QueryRepository>,
        collection: CollectionSpec,
        settings: QueryConfig,
    ) -> Result<Self> {
        if embedder.dimension() != collection.size {
            return Err(Error::Config(format!(
                "Embedder '{}' produces {}-dimensional vectors but collection '{}' has size {}",
                embedder.model_name(),
                embedder.dimension(),
                collection.name,
                collection.size
            )));
        }

        Ok(Self {
            index,
            embedder,
            completer,
            repository,
            collection,
            settings,
            ensured: OnceCell::new(),
        })
    }

    /// Answer a question.
    ///
    /// The record is saved before any provider call. If embedding, search or
    /// synthesis fails, it is stored as `failed` and the error is returned.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryRecord> {
        let top_k = request.validate(&self.settings)?;

        let mut record = QueryRecord::new(request.query_text.trim(), top_k);
        record.context_text = request.context_text.clone();
        record.user_id = request.user_id.clone();
        record.session_id = request.session_id.clone();
        if let Some(filter) = request.active_filter() {
            record.source_id = filter.source_id.clone();
            record.source_type = filter.source_type;
        }
        self.repository.save(&record).await?;

        match self.answer(&mut record, &request).await {
            Ok(()) => {
                info!(
                    "Answered query {} with {} retrieved chunks",
                    record.id,
                    record.retrieved_chunk_texts.len()
                );
                Ok(record)
            }
            Err(err) => {
                warn!("Query {} failed: {}", record.id, err);
                record.error = Some(err.to_string());
                record.transition(QueryStatus::Failed);
                if let Err(update_err) = self.repository.update(&record).await {
                    warn!("Could not mark query {} as failed: {}", record.id, update_err);
                }
                Err(err)
            }
        }
    }

    async fn advance(&self, record: &mut QueryRecord, status: QueryStatus) -> Result<()> {
        record.transition(status);
        self.repository.update(record).await
    }

    async fn answer(&self, record: &mut QueryRecord, request: &QueryRequest) -> Result<()> {
        self.ensured
            .get_or_try_init(|| self.index.ensure_collection(&self.collection))
            .await?;

        self.advance(record, QueryStatus::PendingEmbed).await?;
        let query_vector = embed_all(self.embedder.as_ref(), vec![record.query_text.clone()], 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::EmbeddingProvider("No embedding returned for the query".to_string())
            })?;

        self.advance(record, QueryStatus::PendingSearch).await?;
        let mut matches: Vec<SearchResult> = self
            .index
            .search(
                &self.collection.name,
                &query_vector,
                record.top_k,
                request.active_filter(),
            )
            .await?
            .into_iter()
            .filter(|m| m.score >= self.settings.min_score)
            .collect();
        matches.truncate(record.top_k);

        record.retrieved_chunk_texts = matches.iter().map(|m| m.payload.text.clone()).collect();
        record.retrieved_scores = matches.iter().map(|m| m.score).collect();
        record.retrieved_sources = matches.iter().map(|m| m.payload.source_id.clone()).collect();
        record.confidence_score = matches.first().map(|m| m.score);

        let response = if matches.is_empty() {
            info!("No relevant content for query {}", record.id);
            NO_CONTEXT_RESPONSE.to_string()
        } else {
            self.advance(record, QueryStatus::PendingSynthesis).await?;
            let prompt = build_prompt(
                &record.query_text,
                record.context_text.as_deref(),
                &record.retrieved_chunk_texts,
            );
            self.completer.complete(&prompt).await?
        };

        record.response_text = Some(response);
        self.advance(record, QueryStatus::Answered).await
    }

    /// Attach a feedback score to an answered query; the latest score wins
    pub async fn record_feedback(&self, query_id: &str, score: i32) -> Result<QueryRecord> {
        let mut record = self.get_query(query_id).await?;

        if !FEEDBACK_RANGE.contains(&score) {
            return Err(Error::InvalidRequest(format!(
                "feedback score must be between {} and {}, got {}",
                FEEDBACK_RANGE.start(),
                FEEDBACK_RANGE.end(),
                score
            )));
        }

        if !record.status.is_answered() {
            return Err(Error::QueryNotAnswered(query_id.to_string()));
        }

        record.feedback_score = Some(score);
        self.advance(&mut record, QueryStatus::FeedbackRecorded).await?;
        info!("Recorded feedback {} for query {}", score, query_id);
        Ok(record)
    }

    pub async fn get_query(&self, query_id: &str) -> Result<QueryRecord> {
        self.repository
            .get_by_id(query_id)
            .await?
            .ok_or_else(|| Error::QueryNotFound(query_id.to_string()))
    }

    /// Most recent queries first
    pub async fn list_queries(&self, limit: usize) -> Result<Vec<QueryRecord>> {
        self.repository.list(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkConfig;
    use crate::meta::MemoryQueryStore;
    use crate::pipeline::{IngestPipeline, IngestRequest};
    use crate::store::{Distance, InMemoryIndex, SourceType};
    use crate::testing::{FailingEmbedder, KeywordEmbedder, RecordingCompleter};

    const KEYWORDS: &[&str] = &["alpha", "gamma", "letter", "delta"];

    struct Harness {
        pipeline: QueryPipeline,
        completer: Arc<RecordingCompleter>,
        repository: Arc<MemoryQueryStore>,
    }

    async fn harness_with(
        embedder: Arc<dyn Embedder>,
        completer: RecordingCompleter,
        settings: QueryConfig,
    ) -> Harness {
        let index = Arc::new(InMemoryIndex::new());
        let spec = CollectionSpec::new("test", KEYWORDS.len(), Distance::Cosine);

        let seeding = IngestPipeline::new(
            index.clone(),
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            spec.clone(),
            ChunkConfig::default(),
        )
        .unwrap();
        for (source, source_type, content) in [
            ("greek", SourceType::Chapter, "gamma is the third letter"),
            ("intro", SourceType::Chapter, "alpha comes first"),
            ("drill", SourceType::Exercise, "name the letter after gamma"),
        ] {
            seeding
                .ingest(IngestRequest::new(content, source, source_type))
                .await
                .unwrap();
        }

        let completer = Arc::new(completer);
        let repository = Arc::new(MemoryQueryStore::new());
        let pipeline = QueryPipeline::new(
            index,
            embedder,
            completer.clone(),
            repository.clone(),
            spec,
            settings,
        )
        .unwrap();

        Harness {
            pipeline,
            completer,
            repository,
        }
    }

    async fn harness() -> Harness {
        harness_with(
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            RecordingCompleter::answering("Gamma is the third letter of the Greek alphabet."),
            QueryConfig::default(),
        )
        .await
    }

    #[tokio::test]
    async fn test_query_retrieves_best_chunk() {
        let h = harness().await;

        let record = h
            .pipeline
            .query(QueryRequest::new("what is gamma?").with_top_k(1))
            .await
            .unwrap();

        assert_eq!(record.status, QueryStatus::Answered);
        assert_eq!(record.retrieved_chunk_texts, vec!["gamma is the third letter"]);
        assert_eq!(record.retrieved_sources, vec!["greek"]);
        assert_eq!(record.confidence_score, Some(record.retrieved_scores[0]));
        assert_eq!(
            record.response_text.as_deref(),
            Some("Gamma is the third letter of the Greek alphabet.")
        );

        let prompts = h.completer.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[1] gamma is the third letter"));

        let stored = h.repository.get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_query_respects_top_k_and_filter() {
        let h = harness().await;

        let record = h
            .pipeline
            .query(QueryRequest::new("gamma letter").with_top_k(2))
            .await
            .unwrap();
        assert_eq!(record.retrieved_chunk_texts.len(), 2);
        assert!(record.retrieved_scores[0] >= record.retrieved_scores[1]);

        let filtered = h
            .pipeline
            .query(QueryRequest::new("gamma letter").with_filter(SourceFilter {
                source_id: None,
                source_type: Some(SourceType::Exercise),
            }))
            .await
            .unwrap();
        assert_eq!(
            filtered.retrieved_chunk_texts,
            vec!["name the letter after gamma"]
        );
        assert_eq!(filtered.source_type, Some(SourceType::Exercise));
    }

    #[tokio::test]
    async fn test_zero_matches_still_answers() {
        let h = harness().await;

        let record = h
            .pipeline
            .query(QueryRequest::new("what is gamma?").with_filter(SourceFilter::source("missing")))
            .await
            .unwrap();

        assert_eq!(record.status, QueryStatus::Answered);
        assert!(record.retrieved_chunk_texts.is_empty());
        assert_eq!(record.confidence_score, None);
        assert_eq!(record.response_text.as_deref(), Some(NO_CONTEXT_RESPONSE));
        assert!(h.completer.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_min_score_discards_weak_matches() {
        let settings = QueryConfig {
            min_score: 0.5,
            ..QueryConfig::default()
        };
        let h = harness_with(
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            RecordingCompleter::answering("unused"),
            settings,
        )
        .await;

        let record = h
            .pipeline
            .query(QueryRequest::new("tell me about delta"))
            .await
            .unwrap();
        assert!(record.retrieved_chunk_texts.is_empty());
        assert_eq!(record.response_text.as_deref(), Some(NO_CONTEXT_RESPONSE));
    }

    #[tokio::test]
    async fn test_provider_failures_mark_record_failed() {
        let h = harness_with(
            Arc::new(FailingEmbedder::always(KEYWORDS.len())),
            RecordingCompleter::answering("unused"),
            QueryConfig::default(),
        )
        .await;

        let err = h
            .pipeline
            .query(QueryRequest::new("what is gamma?"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(_)));

        let stored = h.pipeline.list_queries(1).await.unwrap();
        assert_eq!(stored[0].status, QueryStatus::Failed);
        assert!(stored[0].response_text.is_none());
        assert!(stored[0].error.is_some());

        let h = harness_with(
            Arc::new(KeywordEmbedder::new(KEYWORDS)),
            RecordingCompleter::failing(),
            QueryConfig::default(),
        )
        .await;
        let err = h
            .pipeline
            .query(QueryRequest::new("what is gamma?"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CompletionProvider(_)));

        let stored = &h.pipeline.list_queries(1).await.unwrap()[0];
        assert_eq!(stored.status, QueryStatus::Failed);
        assert!(matches!(
            h.pipeline.record_feedback(&stored.id, 3).await,
            Err(Error::QueryNotAnswered(_))
        ));
    }

    #[tokio::test]
    async fn test_feedback_last_write_wins() {
        let h = harness().await;
        let record = h
            .pipeline
            .query(QueryRequest::new("what is gamma?"))
            .await
            .unwrap();

        h.pipeline.record_feedback(&record.id, 4).await.unwrap();
        h.pipeline.record_feedback(&record.id, -1).await.unwrap();

        let stored = h.pipeline.get_query(&record.id).await.unwrap();
        assert_eq!(stored.feedback_score, Some(-1));
        assert_eq!(stored.status, QueryStatus::FeedbackRecorded);
        assert_eq!(stored.response_text, record.response_text);
    }

    #[tokio::test]
    async fn test_feedback_errors() {
        let h = harness().await;

        assert!(matches!(
            h.pipeline.record_feedback("no-such-query", 3).await,
            Err(Error::QueryNotFound(_))
        ));
        // Unknown ids are reported even when the score is also out of range
        assert!(matches!(
            h.pipeline.record_feedback("no-such-query", 9).await,
            Err(Error::QueryNotFound(_))
        ));

        let record = h
            .pipeline
            .query(QueryRequest::new("what is gamma?"))
            .await
            .unwrap();
        assert!(matches!(
            h.pipeline.record_feedback(&record.id, 9).await,
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_requests_are_not_recorded() {
        let h = harness().await;

        for request in [
            QueryRequest::new("   "),
            QueryRequest::new("what is gamma?").with_top_k(0),
            QueryRequest::new("what is gamma?").with_top_k(51),
        ] {
            assert!(matches!(
                h.pipeline.query(request).await,
                Err(Error::InvalidRequest(_))
            ));
        }
        assert!(h.repository.list(10).await.unwrap().is_empty());
    }
}
