//! Configuration management for coursebook
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::chunk::ChunkConfig;
use crate::error::{Error, Result};
use crate::store::{CollectionSpec, Distance};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which vector index implementation to use
    #[serde(default)]
    pub index_backend: IndexBackend,

    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub qdrant_api_key_env: String,

    /// Vector collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Distance metric of the collection
    #[serde(default)]
    pub distance: Distance,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Completion provider configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Catalog file (relative paths resolve against the base directory)
    #[serde(default = "default_catalog_file")]
    pub catalog_file: String,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Vector index implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// External Qdrant server
    #[default]
    Qdrant,
    /// Process-local index, lost on exit
    Memory,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings API
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Environment variable holding the API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Maximum texts per provider request
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default number of retrieved chunks
    #[serde(default = "default_query_k")]
    pub default_k: usize,

    /// Maximum retrieved chunks allowed per query
    #[serde(default = "default_query_max_k")]
    pub max_k: usize,

    /// Minimum similarity score for a chunk to be used as context
    #[serde(default = "default_query_min_score")]
    pub min_score: f32,
}

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default = "default_completion_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_completion_api_key_env")]
    pub api_key_env: String,

    /// Maximum tokens in the generated answer
    #[serde(default = "default_completion_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_completion_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for coursebook data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_backend: IndexBackend::default(),
            qdrant_url: default_qdrant_url(),
            qdrant_api_key_env: default_qdrant_api_key_env(),
            collection_name: default_collection_name(),
            distance: Distance::default(),
            embedding: EmbeddingConfig::default(),
            chunk: ChunkConfig::default(),
            query: QueryConfig::default(),
            completion: CompletionConfig::default(),
            catalog_file: default_catalog_file(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_key_env: default_embedding_api_key_env(),
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    /// Get the embedding API key from environment
    pub fn api_key(&self) -> Option<String> {
        read_env(&self.api_key_env)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_k: default_query_k(),
            max_k: default_query_max_k(),
            min_score: default_query_min_score(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            model: default_completion_model(),
            api_key_env: default_completion_api_key_env(),
            max_tokens: default_completion_max_tokens(),
            temperature: default_completion_temperature(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

impl CompletionConfig {
    /// Get the completion API key from environment
    pub fn api_key(&self) -> Option<String> {
        read_env(&self.api_key_env)
    }
}

fn read_env(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Get the default base directory for coursebook (~/.coursebook)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".coursebook")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("coursebook.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("coursebook.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the Qdrant API key from environment
    pub fn qdrant_api_key(&self) -> Option<String> {
        read_env(&self.qdrant_api_key_env)
    }

    /// Resolved path of the catalog file
    pub fn catalog_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.catalog_file);
        if path.is_absolute() {
            path
        } else {
            self.paths.base_dir.join(path)
        }
    }

    /// The collection every pipeline reads and writes
    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec::new(&self.collection_name, self.embedding.dimension, self.distance)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.chunk.validate()?;

        if self.collection_name.trim().is_empty() {
            return Err(Error::Config("collection_name must not be empty".to_string()));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }

        if self.query.default_k == 0 {
            return Err(Error::Config("query.default_k must be positive".to_string()));
        }

        if self.query.default_k > self.query.max_k {
            return Err(Error::Config(
                "query.default_k must be <= query.max_k".to_string(),
            ));
        }

        if self.query.min_score.is_nan() {
            return Err(Error::Config("query.min_score must be a number".to_string()));
        }

        // Dot products are unbounded; cosine and euclid scores stay within [-1, 1]
        if self.distance != Distance::Dot && !(-1.0..=1.0).contains(&self.query.min_score) {
            return Err(Error::Config(format!(
                "query.min_score must be between -1.0 and 1.0 for {} distance",
                self.distance
            )));
        }

        Ok(())
    }
}

/// Parse a provider base URL so relative endpoint paths extend its path
/// instead of replacing the last segment.
pub fn parse_base_url(raw: &str) -> std::result::Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collection_name, "textbook_content");
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.chunk.chunk_size, 512);
        assert_eq!(config.chunk.overlap, 50);
        assert_eq!(config.distance, Distance::Cosine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.collection_name = "test_collection".to_string();
        config.index_backend = IndexBackend::Memory;
        config.distance = Distance::Dot;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.collection_name, "test_collection");
        assert_eq!(loaded.index_backend, IndexBackend::Memory);
        assert_eq!(loaded.distance, Distance::Dot);
        assert_eq!(loaded.paths.db_file, tmp.path().join("coursebook.db"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            collection_name = "physics"
            distance = "euclid"

            [chunk]
            chunk_size = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.collection_name, "physics");
        assert_eq!(config.distance, Distance::Euclid);
        assert_eq!(config.chunk.chunk_size, 100);
        assert_eq!(config.chunk.overlap, 50);
        assert_eq!(config.query.default_k, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.chunk.overlap = config.chunk.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidChunkConfig(_))
        ));

        config.chunk.overlap = 10;
        assert!(config.validate().is_ok());

        config.query.default_k = config.query.max_k + 1;
        assert!(config.validate().is_err());

        config.query.default_k = 5;
        config.query.min_score = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_score_unbounded_for_dot() {
        let mut config = Config::default();
        config.distance = Distance::Dot;
        config.query.min_score = 12.5;
        assert!(config.validate().is_ok());

        config.query.min_score = f32::NEG_INFINITY;
        assert!(config.validate().is_ok());

        config.query.min_score = f32::NAN;
        assert!(config.validate().is_err());

        config.distance = Distance::Euclid;
        config.query.min_score = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalog_path_resolves_against_base_dir() {
        let mut config = Config::default();
        config.init_paths(Some(PathBuf::from("/data/coursebook")));
        assert_eq!(
            config.catalog_path(),
            PathBuf::from("/data/coursebook/catalog.toml")
        );

        config.catalog_file = "/etc/catalog.toml".to_string();
        assert_eq!(config.catalog_path(), PathBuf::from("/etc/catalog.toml"));
    }
}
