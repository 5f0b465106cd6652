//! Status and collection bootstrap commands

use super::Services;
use crate::error::Result;
use crate::meta::MetaStats;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub index_backend: String,
    pub qdrant_url: String,
    pub collection_name: String,
    pub distance: String,
    pub dimension: usize,
    pub embedding_model: String,
    pub completion_model: String,
    pub index_reachable: bool,
    pub collection_exists: bool,
    pub index_points: u64,
    pub db_stats: MetaStats,
}

/// Create the collection (if missing) and the metadata schema
pub async fn cmd_db_init(services: &Services) -> Result<()> {
    let spec = services.config.collection_spec();
    services.index.ensure_collection(&spec).await?;
    services.db.init_schema().await?;
    info!(
        "Collection {} ready ({} dimensions, {})",
        spec.name, spec.size, spec.distance
    );
    Ok(())
}

/// Get system status
pub async fn cmd_status(services: &Services) -> Result<StatusInfo> {
    info!("Getting status");

    let config = &services.config;
    let db_stats = services.db.stats().await?;

    let (index_reachable, collection_exists, index_points) =
        match services.index.count(&config.collection_name).await {
            Ok(Some(points)) => (true, true, points),
            Ok(None) => (true, false, 0),
            Err(e) => {
                debug!("Vector index error: {:?}", e);
                (false, false, 0)
            }
        };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        index_backend: services.index.backend_name().to_string(),
        qdrant_url: config.qdrant_url.clone(),
        collection_name: config.collection_name.clone(),
        distance: config.distance.to_string(),
        dimension: config.embedding.dimension,
        embedding_model: config.embedding.model.clone(),
        completion_model: config.completion.model.clone(),
        index_reachable,
        collection_exists,
        index_points,
        db_stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 coursebook Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nVector index ({}):", status.index_backend);
    if status.index_backend == "qdrant" {
        println!("  URL: {}", status.qdrant_url);
    }
    println!(
        "  Collection: {} ({} dimensions, {})",
        status.collection_name, status.dimension, status.distance
    );

    let index_status = match (status.index_reachable, status.collection_exists) {
        (true, true) => "✓ Connected",
        (true, false) => "⚠ Connected (collection not created - run 'coursebook db init')",
        _ => "✗ Not connected",
    };
    println!("  Status: {}", index_status);
    println!("  Points: {}", status.index_points);

    println!("\nEmbedding Model: {}", status.embedding_model);
    println!("Completion Model: {}", status.completion_model);

    println!("\nDatabase Stats:");
    println!("  Sources: {}", status.db_stats.source_count);
    println!("  Chunks: {}", status.db_stats.chunk_count);
    println!(
        "  Queries: {} ({} answered)",
        status.db_stats.query_count, status.db_stats.answered_count
    );
}
