//! Query, feedback and history commands

use super::{preview, Services};
use crate::error::Result;
use crate::meta::QueryRecord;
use crate::pipeline::{QueryRequest, SourceFilter};
use crate::store::SourceType;
use tracing::info;

/// Command-line knobs for a question
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub top_k: Option<usize>,
    pub source_id: Option<String>,
    pub source_type: Option<SourceType>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub context_text: Option<String>,
}

impl QueryOptions {
    fn into_request(self, question: &str) -> QueryRequest {
        let filter = SourceFilter {
            source_id: self.source_id,
            source_type: self.source_type,
        };
        QueryRequest {
            query_text: question.to_string(),
            source_filter: (!filter.is_empty()).then_some(filter),
            top_k: self.top_k,
            context_text: self.context_text,
            user_id: self.user_id,
            session_id: self.session_id,
        }
    }
}

/// Ask a question against the indexed content
pub async fn cmd_query(
    services: &Services,
    question: &str,
    options: QueryOptions,
) -> Result<QueryRecord> {
    info!("Query: {}", question);
    services
        .pipelines
        .query
        .query(options.into_request(question))
        .await
}

pub async fn cmd_feedback(services: &Services, query_id: &str, score: i32) -> Result<QueryRecord> {
    services.pipelines.query.record_feedback(query_id, score).await
}

pub async fn cmd_show(services: &Services, query_id: &str) -> Result<QueryRecord> {
    services.pipelines.query.get_query(query_id).await
}

pub async fn cmd_history(services: &Services, limit: usize) -> Result<Vec<QueryRecord>> {
    services.pipelines.query.list_queries(limit).await
}

/// Print an answered (or failed) query with its retrieved passages
pub fn print_query_record(record: &QueryRecord) {
    println!("\n🔍 Query: {}\n", record.query_text);

    if let Some(ref error) = record.error {
        println!("✗ Failed: {}", error);
    }
    if let Some(ref response) = record.response_text {
        println!("{}\n", response.trim());
    }

    if !record.retrieved_chunk_texts.is_empty() {
        println!("Sources:");
        let passages = record
            .retrieved_chunk_texts
            .iter()
            .zip(&record.retrieved_scores)
            .zip(&record.retrieved_sources);
        for (i, ((text, score), source)) in passages.enumerate() {
            println!("{}. [score: {:.3}] {}", i + 1, score, source);
            println!("   {}", preview(text, 200));
        }
        println!();
    }

    if let Some(confidence) = record.confidence_score {
        println!("Confidence: {:.3}", confidence);
    }
    if let Some(feedback) = record.feedback_score {
        println!("Feedback: {}", feedback);
    }
    println!("Query ID: {} ({})", record.id, record.status);
}

pub fn print_history(records: &[QueryRecord]) {
    println!("\n🕘 Recent Queries\n");

    if records.is_empty() {
        println!("No queries yet. Use 'coursebook query' to ask one.");
        return;
    }

    for record in records {
        println!(
            "• {} [{}] {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.status,
            preview(&record.query_text, 80)
        );
        println!("  ID: {}", record.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cmd_ingest_text;
    use crate::commands::test_support::services;
    use crate::error::Error;
    use crate::meta::QueryStatus;

    #[tokio::test]
    async fn test_query_feedback_and_history() {
        let (services, tmp) = services("Force is mass times acceleration.").await;
        let path = tmp.path().join("newton.txt");
        std::fs::write(&path, "Force depends on mass.").unwrap();
        cmd_ingest_text(&services, "newton", &path, SourceType::Chapter)
            .await
            .unwrap();

        let record = cmd_query(&services, "What is force?", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(record.status, QueryStatus::Answered);
        assert_eq!(record.retrieved_sources, vec!["newton"]);
        assert_eq!(
            record.response_text.as_deref(),
            Some("Force is mass times acceleration.")
        );

        let updated = cmd_feedback(&services, &record.id, 4).await.unwrap();
        assert_eq!(updated.feedback_score, Some(4));
        assert_eq!(
            cmd_show(&services, &record.id).await.unwrap().status,
            QueryStatus::FeedbackRecorded
        );

        let history = cmd_history(&services, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, record.id);
    }

    #[tokio::test]
    async fn test_query_options_filter() {
        let (services, tmp) = services("unused").await;
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "A unit vector has length one.").unwrap();
        cmd_ingest_text(&services, "notes", &path, SourceType::Supplementary)
            .await
            .unwrap();

        let options = QueryOptions {
            source_type: Some(SourceType::Chapter),
            user_id: Some("u1".to_string()),
            ..Default::default()
        };
        let record = cmd_query(&services, "unit vector", options).await.unwrap();
        assert!(record.retrieved_chunk_texts.is_empty());
        assert_eq!(record.source_type, Some(SourceType::Chapter));
        assert_eq!(record.user_id.as_deref(), Some("u1"));

        assert!(matches!(
            cmd_show(&services, "missing").await,
            Err(Error::QueryNotFound(_))
        ));
    }
}
