//! CLI commands implementation

pub mod catalog;
pub mod ingest;
pub mod init;
pub mod query;
pub mod sources;
pub mod status;

pub use catalog::*;
pub use ingest::*;
pub use init::*;
pub use query::*;
pub use sources::*;
pub use status::*;

use crate::complete::{create_completer, Completer};
use crate::config::Config;
use crate::embed::{create_embedder, Embedder};
use crate::error::Result;
use crate::meta::{MetaDb, QueryRepository};
use crate::pipeline::Pipelines;
use crate::store::{create_index, VectorIndex};
use std::sync::Arc;

/// Everything a command needs, built once from the configuration
pub struct Services {
    pub config: Config,
    pub db: MetaDb,
    pub index: Arc<dyn VectorIndex>,
    pub pipelines: Pipelines,
}

impl Services {
    /// Connect the metadata database and build the configured providers
    pub async fn open(config: Config) -> Result<Self> {
        let db = MetaDb::connect(&config).await?;
        let index = create_index(&config)?;
        let embedder = create_embedder(&config.embedding)?;
        let completer = create_completer(&config.completion)?;
        Self::from_parts(config, db, index, embedder, completer)
    }

    pub fn from_parts(
        config: Config,
        db: MetaDb,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Result<Self> {
        let repository: Arc<dyn QueryRepository> = Arc::new(db.clone());
        let pipelines = Pipelines::new(&config, index.clone(), embedder, completer, repository)?;
        Ok(Self {
            config,
            db,
            index,
            pipelines,
        })
    }
}

/// Shorten text to `max_chars` characters for terminal output
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    } else {
        flat
    }
}
