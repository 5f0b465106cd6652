use crate::chunk::{chunk_text, compute_text_hash, ChunkConfig};
use crate::embed::{embed_all, Embedder};
use crate::error::{Error, Result};
use crate::store::{
    point_id, ChunkMetadata, CollectionSpec, IndexedPoint, PointPayload, SourceType, VectorIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};
use uuid::Uuid;

/// One document to index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub content: String,
    pub source_id: String,
    #[serde(default)]
    pub source_type: SourceType,
}

impl IngestRequest {
    pub fn new(content: impl Into<String>, source_id: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
            source_type,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_id.trim().is_empty() {
            return Err(Error::InvalidRequest("source_id must not be empty".to_string()));
        }
        Ok(())
    }
}

/// What an ingestion run indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub source_id: String,
    pub source_type: SourceType,
    /// Chunks upserted, after empty windows were dropped
    pub chunks_indexed: usize,
    /// Blake3 hash of the whole content
    pub content_hash: String,
    /// Ids of the points now holding this source, in chunk order
    pub point_ids: Vec<Uuid>,
}

/// Chunk, embed and upsert documents into one collection
pub struct IngestPipeline {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    collection: CollectionSpec,
    chunk_config: ChunkConfig,
    batch_size: usize,
    ensured: OnceCell<()>,
    /// Writes to one source are serialized; different sources run freely
    source_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IngestPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        collection: CollectionSpec,
        chunk_config: ChunkConfig,
    ) -> Result<Self> {
        chunk_config.validate()?;
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
            collection,
            chunk_config,
            batch_size: usize::MAX,
            ensured: OnceCell::new(),
            source_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Cap the number of texts per embedding call
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    async fn ensure_collection(&self) -> Result<()> {
        self.ensured
            .get_or_try_init(|| self.index.ensure_collection(&self.collection))
            .await?;
        Ok(())
    }

    async fn source_lock(&self, source_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.source_locks.lock().await;
        Arc::clone(locks.entry(source_id.to_string()).or_default())
    }

    /// Index one document.
    ///
    /// Nothing reaches the index until every chunk has been embedded. Points
    /// left over from an earlier ingestion of the same source are removed
    /// in the same write that stores the new set. Concurrent ingestions of
    /// one source are applied one after the other, so the last writer's
    /// chunks are what remains.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        request.validate()?;

        let chunks = chunk_text(&request.content, &self.chunk_config)?;
        let content_hash = compute_text_hash(&request.content);
        self.ensure_collection().await?;

        let collection = self.collection.name.as_str();
        let source_id = request.source_id.as_str();

        if chunks.is_empty() {
            debug!("Source {} has no content; clearing its points", source_id);
            let lock = self.source_lock(source_id).await;
            let _guard = lock.lock().await;
            self.index.prune_source(collection, source_id, &[]).await?;
            return Ok(IngestOutcome {
                source_id: request.source_id,
                source_type: request.source_type,
                chunks_indexed: 0,
                content_hash,
                point_ids: Vec::new(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_all(self.embedder.as_ref(), texts, self.batch_size).await?;

        let points: Vec<IndexedPoint> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let (point_key, id) = point_id(source_id, chunk.hash_prefix(8), chunk.index);
                IndexedPoint {
                    id,
                    vector,
                    payload: PointPayload {
                        source_id: request.source_id.clone(),
                        source_type: request.source_type,
                        chunk_index: chunk.index,
                        point_key,
                        metadata: ChunkMetadata {
                            chunk_size: chunk.size,
                            word_count: chunk.word_count,
                            word_start: chunk.word_start,
                            hash: chunk.content_hash,
                            created_at: chunk.created_at.to_rfc3339(),
                        },
                        text: chunk.text,
                    },
                }
            })
            .collect();

        let point_ids: Vec<Uuid> = points.iter().map(|p| p.id).collect();
        let chunks_indexed = points.len();

        {
            let lock = self.source_lock(source_id).await;
            let _guard = lock.lock().await;
            self.index.replace_source(collection, source_id, points).await?;
        }

        info!(
            "Indexed {} chunks for {} source {}",
            chunks_indexed, request.source_type, source_id
        );

        Ok(IngestOutcome {
            source_id: request.source_id,
            source_type: request.source_type,
            chunks_indexed,
            content_hash,
            point_ids,
        })
    }

    /// Remove every point of a source
    pub async fn remove_source(&self, source_id: &str) -> Result<()> {
        self.ensure_collection().await?;
        let lock = self.source_lock(source_id).await;
        let _guard = lock.lock().await;
        self.index
            .delete_by_source(&self.collection.name, source_id)
            .await?;
        info!("Removed source {} from {}", source_id, self.collection.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Distance, InMemoryIndex, SearchFilter, SearchResult};
    use crate::testing::{FailingEmbedder, KeywordEmbedder};
    use async_trait::async_trait;
    use std::time::Duration;

    const KEYWORDS: &[&str] = &["alpha", "beta", "gamma", "delta", "epsilon"];

    fn pipeline_with(
        embedder: Arc<dyn Embedder>,
        chunk_config: ChunkConfig,
    ) -> (IngestPipeline, Arc<InMemoryIndex>) {
        let index = Arc::new(InMemoryIndex::new());
        let spec = CollectionSpec::new("test", embedder.dimension(), Distance::Cosine);
        let pipeline = IngestPipeline::new(index.clone(), embedder, spec, chunk_config).unwrap();
        (pipeline, index)
    }

    async fn source_texts(index: &InMemoryIndex, source_id: &str) -> Vec<String> {
        let filter = SearchFilter::source(source_id);
        let mut results = index
            .search("test", &[1.0; 5], 100, Some(&filter))
            .await
            .unwrap();
        results.sort_by_key(|r| r.payload.chunk_index);
        results.into_iter().map(|r| r.payload.text).collect()
    }

    #[tokio::test]
    async fn test_ingest_overlapping_chunks() {
        let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
        let (pipeline, index) = pipeline_with(embedder, ChunkConfig::new(3, 1).unwrap());

        let outcome = pipeline
            .ingest(IngestRequest::new(
                "alpha beta gamma delta epsilon",
                "greek",
                SourceType::Chapter,
            ))
            .await
            .unwrap();

        assert_eq!(outcome.chunks_indexed, 2);
        assert_eq!(outcome.point_ids.len(), 2);
        assert_eq!(
            source_texts(&index, "greek").await,
            vec!["alpha beta gamma", "gamma delta epsilon"]
        );
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
        let (pipeline, index) = pipeline_with(embedder, ChunkConfig::new(3, 1).unwrap());
        let request = IngestRequest::new("alpha beta gamma delta epsilon", "greek", SourceType::Chapter);

        let first = pipeline.ingest(request.clone()).await.unwrap();
        let second = pipeline.ingest(request).await.unwrap();

        assert_eq!(first.point_ids, second.point_ids);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(index.count("test").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_shorter_reingest_prunes_leftovers() {
        let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
        let (pipeline, index) = pipeline_with(embedder, ChunkConfig::new(2, 0).unwrap());

        pipeline
            .ingest(IngestRequest::new("alpha beta gamma delta epsilon", "greek", SourceType::Chapter))
            .await
            .unwrap();
        pipeline
            .ingest(IngestRequest::new("other text", "other", SourceType::Supplementary))
            .await
            .unwrap();
        assert_eq!(index.count("test").await.unwrap(), Some(4));

        let outcome = pipeline
            .ingest(IngestRequest::new("alpha beta", "greek", SourceType::Chapter))
            .await
            .unwrap();

        assert_eq!(outcome.chunks_indexed, 1);
        assert_eq!(source_texts(&index, "greek").await, vec!["alpha beta"]);
        assert_eq!(source_texts(&index, "other").await, vec!["other text"]);
    }

    /// Index whose source replacement is a separate upsert and a slow prune
    struct SlowPruneIndex {
        inner: InMemoryIndex,
    }

    #[async_trait]
    impl VectorIndex for SlowPruneIndex {
        async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
            self.inner.ensure_collection(spec).await
        }

        async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
            self.inner.upsert(collection, points).await
        }

        async fn search(
            &self,
            collection: &str,
            query_vector: &[f32],
            top_k: usize,
            filter: Option<&SearchFilter>,
        ) -> Result<Vec<SearchResult>> {
            self.inner.search(collection, query_vector, top_k, filter).await
        }

        async fn delete_by_source(&self, collection: &str, source_id: &str) -> Result<()> {
            self.inner.delete_by_source(collection, source_id).await
        }

        async fn prune_source(
            &self,
            collection: &str,
            source_id: &str,
            keep: &[Uuid],
        ) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.prune_source(collection, source_id, keep).await
        }

        async fn count(&self, collection: &str) -> Result<Option<u64>> {
            self.inner.count(collection).await
        }

        fn backend_name(&self) -> &'static str {
            "slow-prune"
        }
    }

    #[tokio::test]
    async fn test_concurrent_ingest_of_one_source_keeps_last_writer() {
        let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(KEYWORDS));
        let index = Arc::new(SlowPruneIndex {
            inner: InMemoryIndex::new(),
        });
        let spec = CollectionSpec::new("test", embedder.dimension(), Distance::Cosine);
        let pipeline = IngestPipeline::new(
            index.clone(),
            embedder,
            spec,
            ChunkConfig::new(3, 0).unwrap(),
        )
        .unwrap();

        let (first, second) = tokio::join!(
            pipeline.ingest(IngestRequest::new("alpha one two", "doc", SourceType::Chapter)),
            pipeline.ingest(IngestRequest::new("beta three four", "doc", SourceType::Chapter)),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.point_ids, second.point_ids);

        let texts = source_texts(&index.inner, "doc").await;
        assert_eq!(texts.len(), 1, "source left with {:?}", texts);
        assert!(texts[0] == "alpha one two" || texts[0] == "beta three four");
    }

    #[tokio::test]
    async fn test_embedding_failure_indexes_nothing() {
        let embedder = Arc::new(FailingEmbedder::after_calls(1, 5));
        let (pipeline, index) = pipeline_with(embedder, ChunkConfig::new(2, 0).unwrap());
        let pipeline = pipeline.with_batch_size(2);

        let err = pipeline
            .ingest(IngestRequest::new(
                "one two three four five six",
                "numbers",
                SourceType::Chapter,
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmbeddingProvider(_)));
        assert_eq!(index.count("test").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_blank_content_clears_source_without_embedding() {
        let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
        let (pipeline, index) = pipeline_with(embedder.clone(), ChunkConfig::new(3, 1).unwrap());

        pipeline
            .ingest(IngestRequest::new("alpha beta", "greek", SourceType::Chapter))
            .await
            .unwrap();
        let calls = embedder.calls();

        let outcome = pipeline
            .ingest(IngestRequest::new("  \n\t ", "greek", SourceType::Chapter))
            .await
            .unwrap();

        assert_eq!(outcome.chunks_indexed, 0);
        assert_eq!(embedder.calls(), calls);
        assert_eq!(index.count("test").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_remove_source() {
        let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
        let (pipeline, index) = pipeline_with(embedder, ChunkConfig::new(3, 1).unwrap());

        pipeline
            .ingest(IngestRequest::new("alpha beta gamma delta", "greek", SourceType::Chapter))
            .await
            .unwrap();
        pipeline.remove_source("greek").await.unwrap();
        pipeline.remove_source("never-ingested").await.unwrap();

        assert!(source_texts(&index, "greek").await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_requests_and_configs() {
        let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(KEYWORDS));
        let (pipeline, _index) = pipeline_with(embedder.clone(), ChunkConfig::default());

        assert!(matches!(
            pipeline
                .ingest(IngestRequest::new("alpha", "  ", SourceType::Chapter))
                .await,
            Err(Error::InvalidRequest(_))
        ));

        let index = Arc::new(InMemoryIndex::new());
        let wrong_size = CollectionSpec::new("test", 7, Distance::Cosine);
        assert!(matches!(
            IngestPipeline::new(index, embedder, wrong_size, ChunkConfig::default()),
            Err(Error::Config(_))
        ));
    }
}
