//! Ingestion and query pipelines
//!
//! Ingestion: content -> chunks -> embeddings -> points -> vector index.
//! Query: question -> embedding -> top-k matches -> synthesized answer,
//! with every step recorded on a `QueryRecord`.
//!
//! Requests are typed and validated here, before any provider is called.

mod ingest;
mod query;

pub use ingest::*;
pub use query::*;

use crate::complete::Completer;
use crate::config::Config;
use crate::embed::Embedder;
use crate::error::Result;
use crate::meta::QueryRepository;
use crate::store::VectorIndex;
use std::sync::Arc;

/// Both pipelines wired to the same index, embedder and collection
pub struct Pipelines {
    pub ingest: IngestPipeline,
    pub query: QueryPipeline,
}

impl Pipelines {
    pub fn new(
        config: &Config,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        repository: Arc<dyn QueryRepository>,
    ) -> Result<Self> {
        let ingest = IngestPipeline::new(
            index.clone(),
            embedder.clone(),
            config.collection_spec(),
            config.chunk,
        )?
        .with_batch_size(config.embedding.batch_size);

        let query = QueryPipeline::new(
            index,
            embedder,
            completer,
            repository,
            config.collection_spec(),
            config.query.clone(),
        )?;

        Ok(Self { ingest, query })
    }
}
