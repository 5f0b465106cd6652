//! Qdrant vector database integration

use super::{
    euclid_score, CollectionSpec, Distance, IndexedPoint, PointPayload, SearchFilter,
    SearchResult, VectorIndex,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors_config, Condition, CreateCollectionBuilder,
    DeletePointsBuilder, Distance as QdrantDistance, Filter, GetCollectionInfoResponse, PointId,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Qdrant-backed vector index
pub struct QdrantIndex {
    client: Qdrant,
    url: String,
    known: RwLock<HashMap<String, CollectionSpec>>,
}

impl QdrantIndex {
    /// Create a client for the given gRPC URL
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::IndexUnavailable(format!("{}: {}", url, e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            known: RwLock::new(HashMap::new()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read size and metric of an existing collection from the server
    async fn remote_spec(&self, collection: &str) -> Result<Option<CollectionSpec>> {
        if !self.client.collection_exists(collection).await? {
            return Ok(None);
        }
        let info = self.client.collection_info(collection).await?;
        let (size, distance) = extract_vector_params(&info).ok_or_else(|| {
            Error::CollectionConflict(format!(
                "Collection '{}' uses named vectors or an unsupported metric",
                collection
            ))
        })?;
        Ok(Some(CollectionSpec::new(collection, size, distance)))
    }

    /// Size and distance of a collection, cached after the first lookup
    async fn spec_for(&self, collection: &str) -> Result<CollectionSpec> {
        if let Some(spec) = self.known.read().await.get(collection) {
            return Ok(spec.clone());
        }

        let spec = self
            .remote_spec(collection)
            .await?
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        self.known
            .write()
            .await
            .insert(collection.to_string(), spec.clone());
        Ok(spec)
    }

    async fn delete_by_filter(&self, collection: &str, filter: Filter) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(filter)
                    .wait(true),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        if let Some(existing) = self.remote_spec(&spec.name).await? {
            debug!("Collection {} already exists", spec.name);
            spec.check_compatible(&existing)?;
            self.known
                .write()
                .await
                .insert(spec.name.clone(), existing);
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {} ({})",
            spec.name, spec.size, spec.distance
        );

        let vectors_config = VectorParamsBuilder::new(spec.size as u64, to_qdrant_distance(spec.distance));

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&spec.name).vectors_config(vectors_config),
            )
            .await?;

        self.known
            .write()
            .await
            .insert(spec.name.clone(), spec.clone());

        info!("Collection {} created successfully", spec.name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let spec = self.spec_for(collection).await?;
        for point in &points {
            spec.check_dimension(&point.vector)?;
        }

        debug!("Upserting {} points to collection {}", points.len(), collection);

        let point_structs = points
            .into_iter()
            .map(IndexedPoint::to_point_struct)
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, point_structs).wait(true))
            .await?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        let spec = self.spec_for(collection).await?;
        spec.check_dimension(query_vector)?;

        debug!("Searching collection {} with limit {}", collection, top_k);

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut search_builder =
            SearchPointsBuilder::new(collection, query_vector.to_vec(), top_k as u64)
                .with_payload(true);

        if let Some(qdrant_filter) = filter.and_then(to_qdrant_filter) {
            search_builder = search_builder.filter(qdrant_filter);
        }

        let response = self.client.search_points(search_builder).await?;

        let mut results = Vec::with_capacity(response.result.len());
        for p in response.result {
            let Some(id) = p.id.as_ref().and_then(point_id_to_uuid) else {
                warn!("Skipping point without a UUID id in collection {}", collection);
                continue;
            };
            let payload = PointPayload::from_qdrant_payload(p.payload)?;
            let score = match spec.distance {
                Distance::Euclid => euclid_score(p.score),
                Distance::Cosine | Distance::Dot => p.score,
            };
            results.push(SearchResult { id, score, payload });
        }

        Ok(results)
    }

    async fn delete_by_source(&self, collection: &str, source_id: &str) -> Result<()> {
        debug!("Deleting points of source {} from collection {}", source_id, collection);
        self.delete_by_filter(
            collection,
            Filter::must([Condition::matches("source_id", source_id.to_string())]),
        )
        .await
    }

    async fn prune_source(&self, collection: &str, source_id: &str, keep: &[Uuid]) -> Result<()> {
        if keep.is_empty() {
            return self.delete_by_source(collection, source_id).await;
        }

        let keep_ids: Vec<PointId> = keep.iter().map(|id| PointId::from(id.to_string())).collect();
        let filter = Filter {
            must: vec![Condition::matches("source_id", source_id.to_string())],
            must_not: vec![Condition::has_id(keep_ids)],
            ..Default::default()
        };
        self.delete_by_filter(collection, filter).await
    }

    async fn count(&self, collection: &str) -> Result<Option<u64>> {
        if !self.client.collection_exists(collection).await? {
            return Ok(None);
        }

        let info = self.client.collection_info(collection).await?;
        Ok(Some(
            info.result
                .and_then(|r| r.points_count)
                .unwrap_or(0),
        ))
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}

fn to_qdrant_distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Dot => QdrantDistance::Dot,
        Distance::Euclid => QdrantDistance::Euclid,
    }
}

fn from_qdrant_distance(distance: QdrantDistance) -> Option<Distance> {
    match distance {
        QdrantDistance::Cosine => Some(Distance::Cosine),
        QdrantDistance::Dot => Some(Distance::Dot),
        QdrantDistance::Euclid => Some(Distance::Euclid),
        _ => None,
    }
}

/// Size and metric of a single-vector collection
fn extract_vector_params(info: &GetCollectionInfoResponse) -> Option<(usize, Distance)> {
    let result = info.result.as_ref()?;
    let config = result.config.as_ref()?;
    let params = config.params.as_ref()?;
    let vectors_config = params.vectors_config.as_ref()?;

    match vectors_config.config.as_ref()? {
        vectors_config::Config::Params(params) => {
            let distance = from_qdrant_distance(params.distance())?;
            Some((params.size as usize, distance))
        }
        vectors_config::Config::ParamsMap(_) => None,
    }
}

fn to_qdrant_filter(filter: &SearchFilter) -> Option<Filter> {
    let mut must_conditions: Vec<Condition> = Vec::new();

    if let Some(ref source_id) = filter.source_id {
        must_conditions.push(Condition::matches("source_id", source_id.clone()));
    }

    if let Some(source_type) = filter.source_type {
        must_conditions.push(Condition::matches(
            "source_type",
            source_type.as_str().to_string(),
        ));
    }

    if must_conditions.is_empty() {
        return None;
    }

    Some(Filter::must(must_conditions))
}

/// Convert PointId to UUID
fn point_id_to_uuid(id: &PointId) -> Option<Uuid> {
    match &id.point_id_options {
        Some(PointIdOptions::Uuid(uuid_str)) => Uuid::try_parse(uuid_str).ok(),
        _ => None,
    }
}
