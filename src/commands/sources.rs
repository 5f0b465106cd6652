//! Source listing and removal

use super::Services;
use crate::error::{Error, Result};
use crate::meta::SourceRecord;
use clap_complete::Shell;
use tracing::info;

pub async fn cmd_list_sources(services: &Services) -> Result<Vec<SourceRecord>> {
    info!("Listing sources");
    services.db.list_sources().await
}

/// Remove a source's points from the index and forget it.
///
/// Points are deleted even for ids the sources table does not know, so a
/// half-finished ingest can still be cleaned up; the unknown id is then
/// reported as `SourceNotFound`.
pub async fn cmd_remove_source(services: &Services, source_id: &str) -> Result<()> {
    services.pipelines.ingest.remove_source(source_id).await?;

    if !services.db.delete_source(source_id).await? {
        return Err(Error::SourceNotFound(source_id.to_string()));
    }
    info!("Removed source {}", source_id);
    Ok(())
}

pub fn print_sources(sources: &[SourceRecord]) {
    println!("\n📚 Indexed Sources\n");

    if sources.is_empty() {
        println!("No sources indexed. Use 'coursebook ingest' to add content.");
        return;
    }

    for source in sources {
        println!("• {} [{}]", source.source_id, source.source_type);
        println!("  Chunks: {}", source.chunk_count);
        println!("  Updated: {}", source.updated_at);
        println!();
    }
}

/// Print source ids with descriptions for shell completions
pub fn print_source_completions(sources: &[SourceRecord], shell: Shell) {
    for source in sources {
        let description = format!("{}, {} chunks", source.source_type, source.chunk_count);

        match shell {
            Shell::Zsh => println!("{}:{}", source.source_id, description.replace(':', "\\:")),
            Shell::Fish => println!("{}\t{}", source.source_id, description),
            _ => println!("{}", source.source_id),
        }
    }
}
