//! Process-local vector index
//!
//! Full-scan scoring over points kept in insertion order. Writers take the
//! collection map exclusively, searches share it.

use super::{CollectionSpec, IndexedPoint, SearchFilter, SearchResult, VectorIndex};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

struct MemoryCollection {
    spec: CollectionSpec,
    points: Vec<IndexedPoint>,
    positions: HashMap<Uuid, usize>,
}

impl MemoryCollection {
    fn new(spec: CollectionSpec) -> Self {
        Self {
            spec,
            points: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn retain(&mut self, keep: impl Fn(&IndexedPoint) -> bool) -> usize {
        let before = self.points.len();
        self.points.retain(|p| keep(p));
        self.positions = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();
        before - self.points.len()
    }

    fn insert(&mut self, point: IndexedPoint) {
        match self.positions.get(&point.id) {
            Some(&pos) => self.points[pos] = point,
            None => {
                self.positions.insert(point.id, self.points.len());
                self.points.push(point);
            }
        }
    }
}

/// In-memory vector index
#[derive(Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().await;

        if let Some(existing) = collections.get(&spec.name) {
            debug!("Collection {} already exists", spec.name);
            return spec.check_compatible(&existing.spec);
        }

        info!(
            "Creating in-memory collection {} with dimension {} ({})",
            spec.name, spec.size, spec.distance
        );
        collections.insert(spec.name.clone(), MemoryCollection::new(spec.clone()));
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        for point in &points {
            target.spec.check_dimension(&point.vector)?;
        }

        debug!("Upserting {} points to collection {}", points.len(), collection);

        for point in points {
            target.insert(point);
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        target.spec.check_dimension(query_vector)?;

        debug!("Searching collection {} with limit {}", collection, top_k);

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let distance = target.spec.distance;
        let mut scored: Vec<SearchResult> = target
            .points
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| SearchResult {
                id: p.id,
                score: distance.score(query_vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn delete_by_source(&self, collection: &str, source_id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        let removed = target.retain(|p| p.payload.source_id != source_id);
        debug!(
            "Deleted {} points of source {} from collection {}",
            removed, source_id, collection
        );
        Ok(())
    }

    async fn prune_source(&self, collection: &str, source_id: &str, keep: &[Uuid]) -> Result<()> {
        let keep: HashSet<&Uuid> = keep.iter().collect();
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        let removed =
            target.retain(|p| p.payload.source_id != source_id || keep.contains(&p.id));
        if removed > 0 {
            debug!(
                "Pruned {} stale points of source {} from collection {}",
                removed, source_id, collection
            );
        }
        Ok(())
    }

    async fn replace_source(
        &self,
        collection: &str,
        source_id: &str,
        points: Vec<IndexedPoint>,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        for point in &points {
            target.spec.check_dimension(&point.vector)?;
        }

        let keep: HashSet<Uuid> = points.iter().map(|p| p.id).collect();
        let removed =
            target.retain(|p| p.payload.source_id != source_id || keep.contains(&p.id));
        debug!(
            "Replacing source {} in collection {}: {} points, {} stale removed",
            source_id,
            collection,
            points.len(),
            removed
        );

        for point in points {
            target.insert(point);
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<Option<u64>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| c.points.len() as u64))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
