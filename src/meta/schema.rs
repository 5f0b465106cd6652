//! SQLite schema definition

/// SQL schema for the metadata database
pub const SCHEMA_SQL: &str = r#"
-- Queries: one row per submitted question and its answer
CREATE TABLE IF NOT EXISTS queries (
    id TEXT PRIMARY KEY,
    query_text TEXT NOT NULL,
    context_text TEXT,
    source_id TEXT,
    source_type TEXT,
    top_k INTEGER NOT NULL,
    status TEXT NOT NULL,
    response_text TEXT,
    retrieved_chunks_json TEXT NOT NULL DEFAULT '[]',
    retrieved_scores_json TEXT NOT NULL DEFAULT '[]',
    retrieved_sources_json TEXT NOT NULL DEFAULT '[]',
    confidence_score REAL,
    error TEXT,
    user_id TEXT,
    session_id TEXT,
    feedback_score INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Sources: content ingested into the vector index
CREATE TABLE IF NOT EXISTS sources (
    source_id TEXT PRIMARY KEY,
    source_type TEXT NOT NULL,
    chunk_count INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queries_created ON queries(created_at);
CREATE INDEX IF NOT EXISTS idx_queries_session ON queries(session_id);
CREATE INDEX IF NOT EXISTS idx_sources_type ON sources(source_type);
"#;
