//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - An HTTP backend for OpenAI-compatible embedding APIs
//! - All-or-nothing batch processing

mod http_backend;

pub use http_backend::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Trait for embedding providers.
///
/// Implementations return exactly one vector per input, in input order, or
/// fail the whole call with `Error::EmbeddingProvider`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder = HttpEmbedder::new(config)?;
    Ok(Arc::new(embedder))
}

/// Embed every text, `batch_size` texts per provider call.
///
/// Nothing is returned unless every batch succeeds, and the result is checked
/// to hold one vector of the embedder's dimension per input.
pub async fn embed_all(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let expected = texts.len();
    let batch_size = batch_size.max(1);
    let mut all_embeddings = Vec::with_capacity(expected);

    for (i, batch) in texts.chunks(batch_size).enumerate() {
        debug!(
            "Embedding batch {} ({} texts) with {}",
            i,
            batch.len(),
            embedder.model_name()
        );
        let embeddings = embedder.embed(batch.to_vec()).await?;
        if embeddings.len() != batch.len() {
            return Err(Error::EmbeddingProvider(format!(
                "Model '{}' returned {} embeddings for {} inputs",
                embedder.model_name(),
                embeddings.len(),
                batch.len()
            )));
        }
        all_embeddings.extend(embeddings);
    }

    validate_dimensions(embedder.model_name(), embedder.dimension(), &all_embeddings)?;
    Ok(all_embeddings)
}

/// Every vector must have the model's dimension; a short vector is a
/// provider fault, never something to pad.
pub fn validate_dimensions(model: &str, dimension: usize, embeddings: &[Vec<f32>]) -> Result<()> {
    if let Some(mismatch) = embeddings.iter().find(|vec| vec.len() != dimension) {
        return Err(Error::EmbeddingProvider(format!(
            "Embedding dimension mismatch for model '{}': expected {}, got {}",
            model,
            dimension,
            mismatch.len()
        )));
    }
    Ok(())
}
