//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Paths created by `coursebook init`
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    /// The configuration was replaced with defaults
    pub overwritten: bool,
}

/// Write a default configuration and create the metadata database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitReport> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    let exists = config.paths.config_file.exists();
    if exists && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite it.",
            config.paths.config_file.display()
        )));
    }

    config.save()?;
    let db = MetaDb::connect(&config).await?;
    db.close().await;

    info!("Initialized coursebook in {}", config.paths.base_dir.display());
    Ok(InitReport {
        config_path: config.paths.config_file,
        db_path: config.paths.db_file,
        overwritten: exists,
    })
}

pub fn print_init_report(report: &InitReport) {
    let verb = if report.overwritten { "Reset" } else { "Created" };
    println!("✓ {} config: {}", verb, report.config_path.display());
    println!("✓ Database: {}", report.db_path.display());
    println!("\nNext steps:");
    println!("  1. Point embedding/completion URLs in the config at your providers");
    println!("  2. coursebook db init");
    println!("  3. coursebook ingest catalog");
}
