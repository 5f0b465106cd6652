//! Default values for configuration

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("COURSEBOOK_QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Default collection name
pub fn default_collection_name() -> String {
    "textbook_content".to_string()
}

/// Default embedding backend URL (OpenAI-compatible)
pub fn default_embedding_url() -> String {
    std::env::var("COURSEBOOK_EMBEDDING_URL")
        .unwrap_or_else(|_| "https://api.openai.com".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

/// Default embedding dimension (text-embedding-ada-002)
pub fn default_embedding_dimension() -> usize {
    1536
}

/// Default environment variable name for the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    64
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default words per chunk
pub fn default_chunk_size() -> usize {
    512
}

/// Default overlapping words between consecutive chunks
pub fn default_chunk_overlap() -> usize {
    50
}

/// Default number of query results
pub fn default_query_k() -> usize {
    5
}

/// Default maximum query results
pub fn default_query_max_k() -> usize {
    50
}

/// Default minimum similarity score
pub fn default_query_min_score() -> f32 {
    0.0
}

/// Default completion backend URL (OpenAI-compatible)
pub fn default_completion_url() -> String {
    std::env::var("COURSEBOOK_COMPLETION_URL")
        .unwrap_or_else(|_| "https://api.openai.com".to_string())
}

/// Default completion model
pub fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default environment variable name for the completion API key
pub fn default_completion_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default maximum tokens in a generated answer
pub fn default_completion_max_tokens() -> u32 {
    512
}

/// Default sampling temperature
pub fn default_completion_temperature() -> f32 {
    0.2
}

/// Default completion request timeout in seconds
pub fn default_completion_timeout() -> u64 {
    60
}

/// Default catalog file name, relative to the base directory
pub fn default_catalog_file() -> String {
    "catalog.toml".to_string()
}
