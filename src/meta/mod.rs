//! Metadata storage
//!
//! This module holds everything the pipelines persist outside the vector index:
//! - Query records (question, retrieved context, answer, feedback)
//! - Sources (what was ingested, how many chunks, which content hash)
//!
//! Query records go through the `QueryRepository` trait so the query pipeline
//! never depends on a particular store. `MetaDb` is the SQLite implementation,
//! `MemoryQueryStore` the process-local one.

mod memory;
mod schema;

pub use memory::*;
pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::SourceType;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle of a query record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Created,
    PendingEmbed,
    PendingSearch,
    PendingSynthesis,
    Answered,
    FeedbackRecorded,
    /// A provider or index error aborted the run
    Failed,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Created => "created",
            QueryStatus::PendingEmbed => "pending_embed",
            QueryStatus::PendingSearch => "pending_search",
            QueryStatus::PendingSynthesis => "pending_synthesis",
            QueryStatus::Answered => "answered",
            QueryStatus::FeedbackRecorded => "feedback_recorded",
            QueryStatus::Failed => "failed",
        }
    }

    /// Whether the record carries a usable answer
    pub fn is_answered(&self) -> bool {
        matches!(self, QueryStatus::Answered | QueryStatus::FeedbackRecorded)
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "created" => Ok(QueryStatus::Created),
            "pending_embed" => Ok(QueryStatus::PendingEmbed),
            "pending_search" => Ok(QueryStatus::PendingSearch),
            "pending_synthesis" => Ok(QueryStatus::PendingSynthesis),
            "answered" => Ok(QueryStatus::Answered),
            "feedback_recorded" => Ok(QueryStatus::FeedbackRecorded),
            "failed" => Ok(QueryStatus::Failed),
            _ => Err(Error::Other(format!("Unknown query status: {}", s))),
        }
    }
}

/// A submitted question together with what was retrieved and answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    pub query_text: String,
    /// Passage the reader had selected when asking
    pub context_text: Option<String>,
    pub source_id: Option<String>,
    pub source_type: Option<SourceType>,
    pub top_k: usize,
    pub status: QueryStatus,
    pub response_text: Option<String>,
    /// Retrieved chunk texts, best match first
    pub retrieved_chunk_texts: Vec<String>,
    /// Similarity scores parallel to `retrieved_chunk_texts`
    pub retrieved_scores: Vec<f32>,
    /// Source ids parallel to `retrieved_chunk_texts`
    pub retrieved_sources: Vec<String>,
    /// Highest retrieved score; `None` when nothing matched
    pub confidence_score: Option<f32>,
    /// Failure message of a `Failed` run
    pub error: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub feedback_score: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueryRecord {
    pub fn new(query_text: impl Into<String>, top_k: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            query_text: query_text.into(),
            context_text: None,
            source_id: None,
            source_type: None,
            top_k,
            status: QueryStatus::Created,
            response_text: None,
            retrieved_chunk_texts: Vec::new(),
            retrieved_scores: Vec::new(),
            retrieved_sources: Vec::new(),
            confidence_score: None,
            error: None,
            user_id: None,
            session_id: None,
            feedback_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `status` and bump `updated_at`
    pub fn transition(&mut self, status: QueryStatus) {
        debug!("Query {}: {} -> {}", self.id, self.status, status);
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Storage for query records
#[async_trait]
pub trait QueryRepository: Send + Sync {
    /// Insert a new record
    async fn save(&self, record: &QueryRecord) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<QueryRecord>>;

    /// Most recent records first
    async fn list(&self, limit: usize) -> Result<Vec<QueryRecord>>;

    /// Replace an existing record; `QueryNotFound` if the id is unknown
    async fn update(&self, record: &QueryRecord) -> Result<()>;

    /// Remove a record, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Bookkeeping for one ingested source
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_id: String,
    pub source_type: String,
    pub chunk_count: i64,
    pub content_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SourceRecord {
    pub fn new(
        source_id: impl Into<String>,
        source_type: SourceType,
        chunk_count: usize,
        content_hash: impl Into<String>,
    ) -> Self {
        let now = timestamp(&Utc::now());
        Self {
            source_id: source_id.into(),
            source_type: source_type.to_string(),
            chunk_count: chunk_count as i64,
            content_hash: content_hash.into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn get_type(&self) -> Result<SourceType> {
        self.source_type.parse()
    }
}

/// Row counts for `db status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaStats {
    pub query_count: usize,
    pub answered_count: usize,
    pub source_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, FromRow)]
struct QueryRow {
    id: String,
    query_text: String,
    context_text: Option<String>,
    source_id: Option<String>,
    source_type: Option<String>,
    top_k: i64,
    status: String,
    response_text: Option<String>,
    retrieved_chunks_json: String,
    retrieved_scores_json: String,
    retrieved_sources_json: String,
    confidence_score: Option<f64>,
    error: Option<String>,
    user_id: Option<String>,
    session_id: Option<String>,
    feedback_score: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<QueryRow> for QueryRecord {
    type Error = Error;

    fn try_from(row: QueryRow) -> Result<Self> {
        Ok(QueryRecord {
            id: row.id,
            query_text: row.query_text,
            context_text: row.context_text,
            source_id: row.source_id,
            source_type: row
                .source_type
                .as_deref()
                .map(|s| s.parse::<SourceType>())
                .transpose()?,
            top_k: row.top_k.max(0) as usize,
            status: row.status.parse()?,
            response_text: row.response_text,
            retrieved_chunk_texts: serde_json::from_str(&row.retrieved_chunks_json)?,
            retrieved_scores: serde_json::from_str(&row.retrieved_scores_json)?,
            retrieved_sources: serde_json::from_str(&row.retrieved_sources_json)?,
            confidence_score: row.confidence_score.map(|s| s as f32),
            error: row.error,
            user_id: row.user_id,
            session_id: row.session_id,
            feedback_score: row.feedback_score.map(|s| s as i32),
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Fixed-width RFC 3339 so timestamps sort lexically
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the metadata database configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open (creating if needed) the database at `db_path` and make sure the
    /// schema exists
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='queries'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Source Operations =====

    /// Insert a source or refresh its counts, keeping the original `created_at`
    pub async fn upsert_source(&self, source: &SourceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (source_id, source_type, chunk_count, content_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                source_type = excluded.source_type,
                chunk_count = excluded.chunk_count,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&source.source_id)
        .bind(&source.source_type)
        .bind(source.chunk_count)
        .bind(&source.content_hash)
        .bind(&source.created_at)
        .bind(&source.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_source(&self, source_id: &str) -> Result<Option<SourceRecord>> {
        let source =
            sqlx::query_as::<_, SourceRecord>("SELECT * FROM sources WHERE source_id = ?")
                .bind(source_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(source)
    }

    /// List all sources
    pub async fn list_sources(&self) -> Result<Vec<SourceRecord>> {
        let sources =
            sqlx::query_as::<_, SourceRecord>("SELECT * FROM sources ORDER BY source_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(sources)
    }

    /// Delete a source, returning whether it existed
    pub async fn delete_source(&self, source_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Statistics =====

    pub async fn stats(&self) -> Result<MetaStats> {
        let query_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queries")
            .fetch_one(&self.pool)
            .await?;

        let answered_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queries WHERE status IN ('answered', 'feedback_recorded')",
        )
        .fetch_one(&self.pool)
        .await?;

        let source_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
            .fetch_one(&self.pool)
            .await?;

        let chunk_count: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(chunk_count), 0) FROM sources")
                .fetch_one(&self.pool)
                .await?;

        Ok(MetaStats {
            query_count: query_count as usize,
            answered_count: answered_count as usize,
            source_count: source_count as usize,
            chunk_count: chunk_count as usize,
        })
    }
}

#[async_trait]
impl QueryRepository for MetaDb {
    async fn save(&self, record: &QueryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO queries (
                id, query_text, context_text, source_id, source_type, top_k, status,
                response_text, retrieved_chunks_json, retrieved_scores_json,
                retrieved_sources_json, confidence_score, error, user_id, session_id,
                feedback_score, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.query_text)
        .bind(&record.context_text)
        .bind(&record.source_id)
        .bind(record.source_type.map(|t| t.to_string()))
        .bind(record.top_k as i64)
        .bind(record.status.as_str())
        .bind(&record.response_text)
        .bind(serde_json::to_string(&record.retrieved_chunk_texts)?)
        .bind(serde_json::to_string(&record.retrieved_scores)?)
        .bind(serde_json::to_string(&record.retrieved_sources)?)
        .bind(record.confidence_score.map(f64::from))
        .bind(&record.error)
        .bind(&record.user_id)
        .bind(&record.session_id)
        .bind(record.feedback_score.map(i64::from))
        .bind(timestamp(&record.created_at))
        .bind(timestamp(&record.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<QueryRecord>> {
        let row = sqlx::query_as::<_, QueryRow>("SELECT * FROM queries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(QueryRecord::try_from).transpose()
    }

    async fn list(&self, limit: usize) -> Result<Vec<QueryRecord>> {
        let rows = sqlx::query_as::<_, QueryRow>(
            "SELECT * FROM queries ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(QueryRecord::try_from).collect()
    }

    async fn update(&self, record: &QueryRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE queries SET
                status = ?,
                response_text = ?,
                retrieved_chunks_json = ?,
                retrieved_scores_json = ?,
                retrieved_sources_json = ?,
                confidence_score = ?,
                error = ?,
                feedback_score = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(record.status.as_str())
        .bind(&record.response_text)
        .bind(serde_json::to_string(&record.retrieved_chunk_texts)?)
        .bind(serde_json::to_string(&record.retrieved_scores)?)
        .bind(serde_json::to_string(&record.retrieved_sources)?)
        .bind(record.confidence_score.map(f64::from))
        .bind(&record.error)
        .bind(record.feedback_score.map(i64::from))
        .bind(timestamp(&record.updated_at))
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::QueryNotFound(record.id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
