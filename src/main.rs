//! coursebook CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use coursebook::{
    commands::{
        cmd_db_init, cmd_feedback, cmd_history, cmd_ingest_catalog, cmd_ingest_chapter,
        cmd_ingest_text, cmd_init, cmd_list_chapters, cmd_list_exercises, cmd_list_modules,
        cmd_list_sources, cmd_query, cmd_remove_source, cmd_show, cmd_status, load_catalog,
        print_catalog_stats, print_chapters, print_exercises, print_history,
        print_ingest_outcome, print_init_report, print_modules, print_query_record,
        print_source_completions, print_sources, print_status, QueryOptions, Services,
    },
    config::{Config, IndexBackend},
    error::{Error, Result},
    progress::LogWriterFactory,
    store::SourceType,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "coursebook")]
#[command(version, about = "Ask questions about course content, answered from indexed chapters", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Add content to the index
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Ask a question
    Query {
        /// The question
        question: String,

        /// Number of passages to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        /// Only retrieve from this source ID
        #[arg(long)]
        source: Option<String>,

        /// Only retrieve from this kind of source
        #[arg(long, value_parser = parse_source_type)]
        source_type: Option<SourceType>,

        /// User asking the question
        #[arg(long)]
        user: Option<String>,

        /// Session the question belongs to
        #[arg(long)]
        session: Option<String>,

        /// Passage the reader had selected
        #[arg(long)]
        context: Option<String>,
    },

    /// Rate an answer (-1 for thumbs down, 0-5 stars)
    Feedback {
        query_id: String,

        #[arg(allow_negative_numbers = true)]
        score: i32,
    },

    /// Show a recorded query
    Show { query_id: String },

    /// List recent queries, newest first
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List indexed sources
    Sources {
        /// Output only source IDs (one per line, for scripting)
        #[arg(long)]
        ids_only: bool,

        /// Output source IDs with descriptions for shell completions
        #[arg(long, value_enum, hide = true)]
        completion: Option<Shell>,
    },

    /// Remove a source from the index
    ///
    /// Use 'coursebook sources --ids-only' to list available source IDs
    Remove { source_id: String },

    /// List catalog chapters
    Chapters {
        /// Only chapters of this module (ID or slug)
        #[arg(long)]
        module: Option<String>,
    },

    /// List catalog modules by week
    Modules,

    /// List catalog exercises
    Exercises {
        /// Only exercises of this chapter (ID or slug)
        #[arg(long)]
        chapter: Option<String>,
    },

    /// Manage the vector collection
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Create the collection if it does not exist
    Init,

    /// Show index and database status
    Status,
}

#[derive(Subcommand)]
enum IngestSource {
    /// Ingest a text or Markdown file
    Text {
        source_id: String,

        #[arg(short, long)]
        file: PathBuf,

        #[arg(long, value_parser = parse_source_type, default_value = "supplementary")]
        source_type: SourceType,
    },

    /// Ingest one catalog chapter (ID or slug)
    Chapter { chapter: String },

    /// Ingest active modules, published chapters and active exercises
    Catalog,
}

fn parse_source_type(value: &str) -> std::result::Result<SourceType, String> {
    value.parse().map_err(|e: Error| e.to_string())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().map(base_dir_for);
        let report = cmd_init(base_dir, force).await?;
        if cli.json {
            print_json(&report)?;
        } else {
            print_init_report(&report);
        }
        return Ok(());
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "coursebook", &mut std::io::stdout());
        print_completion_extras(shell);
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    // Catalog listings only need the config
    match cli.command {
        Commands::Chapters { module } => {
            let catalog = load_catalog(&config)?;
            let chapters = cmd_list_chapters(&catalog, module.as_deref())?;
            if cli.json {
                print_json(&chapters)?;
            } else {
                print_chapters(&chapters);
            }
            return Ok(());
        }
        Commands::Modules => {
            let catalog = load_catalog(&config)?;
            let modules = cmd_list_modules(&catalog);
            if cli.json {
                print_json(&modules)?;
            } else {
                print_modules(&modules);
            }
            return Ok(());
        }
        Commands::Exercises { chapter } => {
            let catalog = load_catalog(&config)?;
            let exercises = cmd_list_exercises(&catalog, chapter.as_deref())?;
            if cli.json {
                print_json(&exercises)?;
            } else {
                print_exercises(&exercises);
            }
            return Ok(());
        }
        _ => {}
    }

    if config.index_backend == IndexBackend::Memory {
        warn!("Using the in-memory index; indexed content is lost when this command exits");
    }
    let services = Services::open(config).await?;

    match cli.command {
        Commands::Ingest { source } => handle_ingest(&services, source, cli.json).await?,

        Commands::Query {
            question,
            k,
            source,
            source_type,
            user,
            session,
            context,
        } => {
            let options = QueryOptions {
                top_k: k,
                source_id: source,
                source_type,
                user_id: user,
                session_id: session,
                context_text: context,
            };
            let record = cmd_query(&services, &question, options).await?;
            if cli.json {
                print_json(&record)?;
            } else {
                print_query_record(&record);
            }
        }

        Commands::Feedback { query_id, score } => {
            let record = cmd_feedback(&services, &query_id, score).await?;
            if cli.json {
                print_json(&record)?;
            } else {
                println!("✓ Recorded feedback {} for query {}", score, record.id);
            }
        }

        Commands::Show { query_id } => {
            let record = cmd_show(&services, &query_id).await?;
            if cli.json {
                print_json(&record)?;
            } else {
                print_query_record(&record);
            }
        }

        Commands::History { limit } => {
            let records = cmd_history(&services, limit).await?;
            if cli.json {
                print_json(&records)?;
            } else {
                print_history(&records);
            }
        }

        Commands::Sources {
            ids_only,
            completion,
        } => {
            let sources = cmd_list_sources(&services).await?;

            if let Some(shell) = completion {
                print_source_completions(&sources, shell);
            } else if ids_only {
                for source in &sources {
                    println!("{}", source.source_id);
                }
            } else if cli.json {
                print_json(&sources)?;
            } else {
                print_sources(&sources);
            }
        }

        Commands::Remove { source_id } => {
            cmd_remove_source(&services, &source_id).await?;
            if cli.json {
                println!(r#"{{"status": "ok", "removed": {}}}"#, serde_json::to_string(&source_id)?);
            } else {
                println!("✓ Source '{}' removed", source_id);
            }
        }

        Commands::Db { action } => match action {
            DbAction::Init => {
                cmd_db_init(&services).await?;
                if cli.json {
                    println!(r#"{{"status": "ok", "message": "Collection initialized"}}"#);
                } else {
                    println!("✓ Collection '{}' initialized", services.config.collection_name);
                }
            }
            DbAction::Status => {
                let status = cmd_status(&services).await?;
                if cli.json {
                    print_json(&status)?;
                } else {
                    print_status(&status);
                }
            }
        },

        Commands::Init { .. }
        | Commands::Completions { .. }
        | Commands::Chapters { .. }
        | Commands::Modules
        | Commands::Exercises { .. } => unreachable!(),
    }

    Ok(())
}

fn init_logging(verbose: bool, json_logs: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let text_layer = (!json_logs).then(|| fmt::layer().with_writer(LogWriterFactory));
    let json_layer = json_logs.then(|| fmt::layer().json().with_writer(LogWriterFactory));

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(filter)
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `--config` may name a `.toml` file or the directory holding it
fn base_dir_for(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == "toml") {
        path.parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir)
    } else {
        path.to_path_buf()
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => p.to_path_buf(),
        Some(dir) => dir.join("config.toml"),
        None => Config::default_config_path(),
    };

    if !config_path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}. Run 'coursebook init' first.",
            config_path.display()
        )));
    }

    Config::load(&config_path)
}

async fn handle_ingest(services: &Services, source: IngestSource, json: bool) -> Result<()> {
    match source {
        IngestSource::Text {
            source_id,
            file,
            source_type,
        } => {
            let outcome = cmd_ingest_text(services, &source_id, &file, source_type).await?;
            if json {
                print_json(&outcome)?;
            } else {
                print_ingest_outcome(&outcome);
            }
        }

        IngestSource::Chapter { chapter } => {
            let catalog = load_catalog(&services.config)?;
            let outcome = cmd_ingest_chapter(services, &catalog, &chapter).await?;
            if json {
                print_json(&outcome)?;
            } else {
                print_ingest_outcome(&outcome);
            }
        }

        IngestSource::Catalog => {
            let catalog = load_catalog(&services.config)?;
            let stats = cmd_ingest_catalog(services, &catalog, !json).await?;
            if json {
                print_json(&stats)?;
            } else {
                print_catalog_stats(&stats);
            }
        }
    }

    Ok(())
}

/// Completion of source IDs for `coursebook remove`
fn print_completion_extras(shell: Shell) {
    match shell {
        Shell::Bash => {
            println!();
            println!("{}", r#"_coursebook_remove() {"#);
            println!("{}", r#"    local cur="${COMP_WORDS[COMP_CWORD]}""#);
            println!(
                "{}",
                r#"    if [[ $COMP_CWORD -ge 2 && "${COMP_WORDS[COMP_CWORD-1]}" == "remove" ]]; then"#
            );
            println!(
                "{}",
                r#"        COMPREPLY=( $(compgen -W "$(coursebook sources --completion bash 2>/dev/null)" -- "$cur") )"#
            );
            println!("{}", r#"        return 0"#);
            println!("{}", r#"    fi"#);
            println!("{}", r#"    _coursebook "$@""#);
            println!("{}", r#"}"#);
            println!(
                "{}",
                r#"complete -F _coursebook_remove -o bashdefault -o default coursebook"#
            );
        }
        Shell::Zsh => {
            println!();
            println!("{}", r#"_coursebook_source_ids() {"#);
            println!("{}", r#"    local -a entries"#);
            println!(
                "{}",
                r#"    entries=("${(@f)$(coursebook sources --completion zsh 2>/dev/null)}")"#
            );
            println!("{}", r#"    _describe -t sources 'source ids' entries"#);
            println!("{}", r#"}"#);
            println!("{}", r#"compdef _coursebook_source_ids 'coursebook remove'"#);
        }
        Shell::Fish => {
            println!();
            println!(
                "{}",
                r#"complete -c coursebook -n '__fish_seen_subcommand_from remove' -a '(coursebook sources --completion fish 2>/dev/null)'"#
            );
        }
        _ => {}
    }
}
