//! Vector index
//!
//! This module defines the index contract used by the pipelines and provides:
//! - Collection management (ensure-exists with conflict detection)
//! - Point upsert and delete-by-source
//! - Top-k similarity search
//!
//! Two backends implement it: Qdrant for deployments, and a process-local
//! full-scan index for when no external store is configured.

mod memory;
mod payload;
mod qdrant;

pub use memory::*;
pub use payload::*;
pub use qdrant::*;

use crate::config::{Config, IndexBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Distance metric of a collection.
///
/// Scores are always "higher is better": cosine and dot report the raw
/// similarity, euclid reports `1 / (1 + distance)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    /// Similarity score between two vectors of equal length
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Distance::Cosine => cosine_similarity(a, b),
            Distance::Dot => dot(a, b),
            Distance::Euclid => euclid_score(euclidean_distance(a, b)),
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Cosine => write!(f, "cosine"),
            Distance::Dot => write!(f, "dot"),
            Distance::Euclid => write!(f, "euclid"),
        }
    }
}

impl FromStr for Distance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "dot" | "dot-product" | "dot_product" => Ok(Distance::Dot),
            "euclid" | "euclidean" => Ok(Distance::Euclid),
            _ => Err(Error::Config(format!("Unknown distance metric: {}", s))),
        }
    }
}

/// Identity of a collection: name, vector size and metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub size: usize,
    pub distance: Distance,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, size: usize, distance: Distance) -> Self {
        Self {
            name: name.into(),
            size,
            distance,
        }
    }

    /// Fail with `CollectionConflict` unless `existing` has the same size and metric
    pub fn check_compatible(&self, existing: &CollectionSpec) -> Result<()> {
        if existing.size != self.size || existing.distance != self.distance {
            return Err(Error::CollectionConflict(format!(
                "Collection '{}' exists with size {} and distance {}, but size {} and distance {} were requested",
                self.name, existing.size, existing.distance, self.size, self.distance
            )));
        }
        Ok(())
    }

    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.size {
            return Err(Error::DimensionMismatch {
                expected: self.size,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: Uuid,
    pub score: f32,
    pub payload: PointPayload,
}

/// Search filter options; set fields are AND-ed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub source_id: Option<String>,
    pub source_type: Option<SourceType>,
}

impl SearchFilter {
    pub fn source(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            source_type: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source_id.is_none() && self.source_type.is_none()
    }

    pub fn matches(&self, payload: &PointPayload) -> bool {
        if let Some(ref id) = self.source_id {
            if &payload.source_id != id {
                return false;
            }
        }
        if let Some(source_type) = self.source_type {
            if payload.source_type != source_type {
                return false;
            }
        }
        true
    }
}

/// Contract every vector index backend fulfils
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if absent; `CollectionConflict` if it exists
    /// with a different size or metric.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()>;

    /// Insert or overwrite points by id. Every vector is checked against the
    /// collection size before anything is written.
    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()>;

    /// Up to `top_k` points ranked by descending score
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Remove every point whose payload `source_id` matches. No-op when none do.
    async fn delete_by_source(&self, collection: &str, source_id: &str) -> Result<()>;

    /// Remove points of `source_id` whose id is not in `keep`
    async fn prune_source(&self, collection: &str, source_id: &str, keep: &[Uuid]) -> Result<()>;

    /// Make `points` the complete set of points for `source_id`: upsert them,
    /// then drop any other point of that source. Backends that can do both
    /// under one write override this so readers never see a partial set.
    async fn replace_source(
        &self,
        collection: &str,
        source_id: &str,
        points: Vec<IndexedPoint>,
    ) -> Result<()> {
        let keep: Vec<Uuid> = points.iter().map(|p| p.id).collect();
        self.upsert(collection, points).await?;
        self.prune_source(collection, source_id, &keep).await
    }

    /// Number of points, or `None` if the collection does not exist
    async fn count(&self, collection: &str) -> Result<Option<u64>>;

    fn backend_name(&self) -> &'static str;
}

/// Create the configured vector index backend
pub fn create_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    match config.index_backend {
        IndexBackend::Qdrant => Ok(Arc::new(QdrantIndex::new(
            &config.qdrant_url,
            config.qdrant_api_key(),
        )?)),
        IndexBackend::Memory => Ok(Arc::new(InMemoryIndex::new())),
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot(a, b) / denom
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Map a euclidean distance onto (0, 1], identical vectors scoring 1.0
pub fn euclid_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_score_highest() {
        let v = [0.3, -0.2, 0.9];
        let other = [0.1, 0.5, 0.2];

        for distance in [Distance::Cosine, Distance::Euclid] {
            assert!(distance.score(&v, &v) > distance.score(&v, &other));
        }
        assert!((Distance::Cosine.score(&v, &v) - 1.0).abs() < 1e-6);
        assert!((Distance::Euclid.score(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_distance_parsing() {
        assert_eq!("Cosine".parse::<Distance>().unwrap(), Distance::Cosine);
        assert_eq!("dot-product".parse::<Distance>().unwrap(), Distance::Dot);
        assert_eq!("euclidean".parse::<Distance>().unwrap(), Distance::Euclid);
        assert!("manhattan".parse::<Distance>().is_err());
    }

    #[test]
    fn test_collection_compatibility() {
        let spec = CollectionSpec::new("docs", 3, Distance::Cosine);
        assert!(spec.check_compatible(&spec.clone()).is_ok());

        let resized = CollectionSpec::new("docs", 4, Distance::Cosine);
        assert!(matches!(
            spec.check_compatible(&resized),
            Err(Error::CollectionConflict(_))
        ));

        let remetric = CollectionSpec::new("docs", 3, Distance::Dot);
        assert!(matches!(
            spec.check_compatible(&remetric),
            Err(Error::CollectionConflict(_))
        ));

        assert!(matches!(
            spec.check_dimension(&[1.0]),
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }
}
