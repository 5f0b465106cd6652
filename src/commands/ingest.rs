//! Ingest commands: free text, single chapters, the whole catalog

use super::Services;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::meta::SourceRecord;
use crate::pipeline::{IngestOutcome, IngestRequest};
use crate::progress::TaskProgress;
use crate::store::SourceType;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Totals for a catalog ingestion
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogIngestStats {
    pub documents: usize,
    pub chunks_indexed: usize,
    /// Documents that produced no chunks
    pub empty_documents: usize,
    pub outcomes: Vec<IngestOutcome>,
}

/// Index one document and record it in the sources table
async fn ingest_document(services: &Services, request: IngestRequest) -> Result<IngestOutcome> {
    let outcome = services.pipelines.ingest.ingest(request).await?;

    if outcome.chunks_indexed == 0 {
        services.db.delete_source(&outcome.source_id).await?;
    } else {
        services
            .db
            .upsert_source(&SourceRecord::new(
                &outcome.source_id,
                outcome.source_type,
                outcome.chunks_indexed,
                &outcome.content_hash,
            ))
            .await?;
    }

    Ok(outcome)
}

/// Ingest the contents of a text or Markdown file under `source_id`
pub async fn cmd_ingest_text(
    services: &Services,
    source_id: &str,
    path: &Path,
    source_type: SourceType,
) -> Result<IngestOutcome> {
    info!("Ingesting {} as {} source {}", path.display(), source_type, source_id);

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    ingest_document(services, IngestRequest::new(content, source_id, source_type)).await
}

/// Ingest one catalog chapter (by id or slug)
pub async fn cmd_ingest_chapter(
    services: &Services,
    catalog: &Catalog,
    chapter: &str,
) -> Result<IngestOutcome> {
    let chapter = catalog.chapter(chapter)?;
    info!("Ingesting chapter {} ({})", chapter.id, chapter.title);

    ingest_document(
        services,
        IngestRequest::new(chapter.indexable_text(), chapter.source_id(), SourceType::Chapter),
    )
    .await
}

/// Ingest active modules, published chapters and active exercises
pub async fn cmd_ingest_catalog(
    services: &Services,
    catalog: &Catalog,
    show_progress: bool,
) -> Result<CatalogIngestStats> {
    let documents = catalog.documents();
    info!("Ingesting {} catalog documents", documents.len());

    let progress = TaskProgress::start(documents.len(), "Ingesting catalog", show_progress);
    let mut stats = CatalogIngestStats::default();

    for doc in documents {
        progress.set_message(&doc.title);
        let request = IngestRequest::new(doc.content, doc.source_id, doc.source_type);
        let outcome = match ingest_document(services, request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                progress.abandon();
                return Err(e);
            }
        };

        stats.documents += 1;
        stats.chunks_indexed += outcome.chunks_indexed;
        if outcome.chunks_indexed == 0 {
            stats.empty_documents += 1;
        }
        stats.outcomes.push(outcome);
        progress.advance();
    }

    progress.finish("Catalog ingested");
    Ok(stats)
}

pub fn print_ingest_outcome(outcome: &IngestOutcome) {
    println!(
        "✓ Indexed {} ({}): {} chunks",
        outcome.source_id, outcome.source_type, outcome.chunks_indexed
    );
    println!("  Content hash: {}", &outcome.content_hash[..outcome.content_hash.len().min(16)]);
}

pub fn print_catalog_stats(stats: &CatalogIngestStats) {
    println!("\n✓ Catalog ingestion complete");
    println!("  Documents processed: {}", stats.documents);
    println!("  Chunks indexed: {}", stats.chunks_indexed);
    if stats.empty_documents > 0 {
        println!("  Empty documents: {}", stats.empty_documents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::services;
    use crate::error::Error;

    const CATALOG: &str = r#"
        [[modules]]
        id = "m1"
        title = "Mechanics"
        slug = "mechanics"
        week_number = 1
        description = "Force and mass"

        [[chapters]]
        id = "c1"
        title = "Newton"
        slug = "newton"
        module_id = "m1"
        chapter_number = 1
        content = "Force equals mass times acceleration."
        is_published = true

        [[chapters]]
        id = "c2"
        title = "Draft"
        slug = "draft"
        module_id = "m1"
        chapter_number = 2
        content = "Unpublished vector notes."

        [[exercises]]
        id = "e1"
        title = "Compute force"
        chapter_id = "c1"
        module_id = "m1"
        content = "A 2 kg mass accelerates at 3 m/s^2."
        solution = "6 N"
    "#;

    #[tokio::test]
    async fn test_ingest_text_records_source() {
        let (services, tmp) = services("unused").await;
        let path = tmp.path().join("notes.md");
        std::fs::write(&path, "A vector has magnitude and direction.").unwrap();

        let outcome = cmd_ingest_text(&services, "notes", &path, SourceType::Supplementary)
            .await
            .unwrap();
        assert_eq!(outcome.chunks_indexed, 1);

        let source = services.db.get_source("notes").await.unwrap().unwrap();
        assert_eq!(source.chunk_count, 1);
        assert_eq!(source.get_type().unwrap(), SourceType::Supplementary);
        assert_eq!(source.content_hash, outcome.content_hash);

        std::fs::write(&path, "   ").unwrap();
        let outcome = cmd_ingest_text(&services, "notes", &path, SourceType::Supplementary)
            .await
            .unwrap();
        assert_eq!(outcome.chunks_indexed, 0);
        assert!(services.db.get_source("notes").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ingest_missing_file() {
        let (services, tmp) = services("unused").await;
        let err = cmd_ingest_text(
            &services,
            "ghost",
            &tmp.path().join("missing.txt"),
            SourceType::Chapter,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Other(msg) if msg.contains("missing.txt")));
    }

    #[tokio::test]
    async fn test_ingest_catalog_skips_drafts() {
        let (services, _tmp) = services("unused").await;
        let catalog = Catalog::from_toml(CATALOG).unwrap();

        let stats = cmd_ingest_catalog(&services, &catalog, false).await.unwrap();
        assert_eq!(stats.documents, 3);

        let mut ids: Vec<String> = services
            .db
            .list_sources()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.source_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["chapter:c1", "exercise:e1", "module:m1"]);

        let chapter = cmd_ingest_chapter(&services, &catalog, "draft").await.unwrap();
        assert_eq!(chapter.source_id, "chapter:c2");
        assert!(matches!(
            cmd_ingest_chapter(&services, &catalog, "nope").await,
            Err(Error::CatalogEntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_ids_shared_across_kinds_stay_separate() {
        let (services, _tmp) = services("unused").await;
        let catalog = Catalog::from_toml(
            r#"
            [[modules]]
            id = "intro"
            title = "Introduction"
            slug = "intro-module"
            week_number = 1
            description = "Units and mass"

            [[chapters]]
            id = "intro"
            title = "Vectors"
            slug = "intro-chapter"
            module_id = "intro"
            chapter_number = 1
            content = "A vector has magnitude and direction."
            is_published = true
            "#,
        )
        .unwrap();

        let stats = cmd_ingest_catalog(&services, &catalog, false).await.unwrap();
        assert_eq!(stats.documents, 2);

        let mut ids: Vec<String> = services
            .db
            .list_sources()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.source_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["chapter:intro", "module:intro"]);
        assert_eq!(
            services
                .index
                .count(&services.config.collection_name)
                .await
                .unwrap(),
            Some(2)
        );
    }
}
