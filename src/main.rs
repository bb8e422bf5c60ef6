//! # lexrag CLI
//!
//! The `lexrag` binary drives the full pipeline: database initialization,
//! corpus parsing, embedding, loading, retrieval, answering, and the HTTP
//! API.
//!
//! ## Usage
//!
//! ```bash
//! lexrag --config ./config/lexrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexrag init` | Create the pgvector schema and indexes |
//! | `lexrag parse` | Convert law XML into per-section NDJSON |
//! | `lexrag embed` | Attach embeddings to section records |
//! | `lexrag load` | Bulk-insert embedded sections into Postgres |
//! | `lexrag search "<query>"` | Print the top-k nearest sections |
//! | `lexrag ask "<question>"` | RAG answer with citations |
//! | `lexrag stats` | Corpus overview |
//! | `lexrag serve api` | Start the HTTP JSON API |

mod chat;
mod config;
mod db;
mod embed_cmd;
mod embedding;
mod load_cmd;
mod migrate;
mod models;
mod ndjson;
mod parse;
mod progress;
mod rag;
mod search;
mod server;
mod stats;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::progress::ProgressMode;

/// lexrag — retrieval-augmented question answering over German statutory
/// text (StGB).
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lexrag.example.toml` for a full example. The Azure
/// OpenAI API key is read from the AZURE_OPENAI_API_KEY environment
/// variable; the database password from PGPASSWORD.
#[derive(Parser)]
#[command(
    name = "lexrag",
    about = "Retrieval-augmented question answering over German statutory text",
    version,
    long_about = "lexrag ingests a law XML corpus, splits it into per-section records, \
    embeds them via a remote embedding API, stores the vectors in Postgres with pgvector, \
    and answers questions grounded on the retrieved sections with citations."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lexrag.toml")]
    config: PathBuf,

    /// Progress output on stderr: auto (TTY), human, json, or off.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the `vector` extension, the `legal` schema, the documents
    /// and chunks tables, and the cosine ANN index. Idempotent.
    Init,

    /// Convert a law XML file into per-section NDJSON.
    ///
    /// Every `<norm>` whose `<enbez>` starts with `§` becomes one record;
    /// table-of-contents and heading norms are skipped.
    Parse {
        /// Path to the law XML file (gii norm format).
        #[arg(long)]
        input: PathBuf,

        /// Output NDJSON path (one section per line).
        #[arg(long)]
        output: PathBuf,
    },

    /// Attach embeddings to section records.
    ///
    /// Calls the remote embedding API in batches with retry/backoff and
    /// writes a new NDJSON file with an `embedding` field per record.
    Embed {
        /// Input NDJSON with parsed sections.
        #[arg(long)]
        input: PathBuf,

        /// Output NDJSON (records gain an `embedding` field).
        #[arg(long)]
        output: PathBuf,

        /// Resume: skip records already embedded in the output file.
        #[arg(long)]
        resume: bool,

        /// Maximum number of sections to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config (texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without calling the API.
        #[arg(long)]
        dry_run: bool,
    },

    /// Bulk-insert embedded sections into Postgres.
    ///
    /// Inserts in batches with a conflict-ignore constraint; re-running
    /// resumes where the previous run stopped.
    Load {
        /// Input NDJSON with embedded sections.
        #[arg(long)]
        input: PathBuf,

        /// Maximum number of sections to load.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the top-k sections nearest to a query.
    Search {
        /// The search query string.
        query: String,

        /// Number of results to return.
        #[arg(long)]
        k: Option<i64>,

        /// Law abbreviation filter (default from config, usually StGB).
        #[arg(long)]
        law: Option<String>,
    },

    /// Answer a question grounded on retrieved sections.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of sections to retrieve as context.
        #[arg(long)]
        k: Option<i64>,

        /// Law abbreviation filter (default from config, usually StGB).
        #[arg(long)]
        law: Option<String>,
    },

    /// Show corpus statistics (documents, sections, embedding coverage).
    Stats,

    /// Start the HTTP JSON API.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Start the HTTP API server (`POST /ask`, `GET /health`).
    Api,
}

fn progress_mode(flag: &str) -> anyhow::Result<ProgressMode> {
    match flag {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        "off" => Ok(ProgressMode::Off),
        other => anyhow::bail!(
            "Unknown progress mode: {}. Use auto, human, json, or off.",
            other
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Parse is pure file-to-file and must work without a config file.
    if let Commands::Parse { input, output } = &cli.command {
        let summary = parse::run_parse(input, output)?;
        println!("parse");
        println!("  norms seen: {}", summary.norms_seen);
        println!("  sections written: {}", summary.sections_written);
        println!("  wrote: {}", output.display());
        println!("ok");
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let reporter = progress_mode(&cli.progress)?.reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Parse { .. } => unreachable!(),
        Commands::Embed {
            input,
            output,
            resume,
            limit,
            batch_size,
            dry_run,
        } => {
            embed_cmd::run_embed(
                &cfg,
                &input,
                &output,
                resume,
                limit,
                batch_size,
                dry_run,
                reporter.as_ref(),
            )
            .await?;
        }
        Commands::Load { input, limit } => {
            load_cmd::run_load(&cfg, &input, limit, reporter.as_ref()).await?;
        }
        Commands::Search { query, k, law } => {
            search::run_search(&cfg, &query, k, law).await?;
        }
        Commands::Ask { question, k, law } => {
            rag::run_ask(&cfg, &question, k, law).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Api => {
                server::run_server(&cfg).await?;
            }
        },
    }

    Ok(())
}
