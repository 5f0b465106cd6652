//! Custom error types for coursebook

use thiserror::Error;

/// Main error type for coursebook operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Completion provider error: {0}")]
    CompletionProvider(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection conflict: {0}")]
    CollectionConflict(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Query not found: {0}")]
    QueryNotFound(String),

    #[error("Query {0} has no answer to attach feedback to")]
    QueryNotAnswered(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Catalog entry not found: {0}")]
    CatalogEntryNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Qdrant failures surface as an unavailable index; configuration problems
/// are detected before a request is sent.
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::IndexUnavailable(err.to_string())
    }
}

/// Result type alias for coursebook
pub type Result<T> = std::result::Result<T, Error>;
