//! # docqa CLI
//!
//! Upload documents, ask questions about them, and run the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the database and upload directory |
//! | `docqa upload <file>` | Ingest a `.txt`, `.md`, or `.pdf` file |
//! | `docqa documents` | List ingested documents |
//! | `docqa delete <doc_id>` | Delete a document and its upload file |
//! | `docqa retrieve "<question>"` | Show the most relevant passages |
//! | `docqa ask "<question>"` | Answer a question from the documents |
//! | `docqa health` | Database and provider status (JSON) |
//! | `docqa serve` | Start the HTTP API |
//!
//! Logs go to stderr. Set `RUST_LOG` to override the default filter.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::{ask, config, documents, health, ingest, migrate, server};

/// docqa: ask questions about your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa: retrieval-augmented question answering over your documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    /// Debug logging for docqa and the HTTP layer.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and upload directory. Safe to re-run.
    Init,

    /// Ingest a document (.txt, .md, or .pdf).
    Upload {
        /// Path to the file.
        file: PathBuf,
    },

    /// List ingested documents, newest first.
    Documents,

    /// Delete a document's chunks and its stored upload.
    Delete {
        /// Document id printed by `upload` or `documents`.
        doc_id: String,
    },

    /// Show the passages most relevant to a question, without generating an answer.
    Retrieve {
        question: String,

        /// Number of passages (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a question using the ingested documents.
    Ask { question: String },

    /// Print a JSON health report.
    Health,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "docqa=debug,docqa_core=debug,tower_http=debug"
    } else {
        "docqa=info,docqa_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { file } => {
            ingest::run_upload(&cfg, &file).await?;
        }
        Commands::Documents => {
            documents::run_list(&cfg).await?;
        }
        Commands::Delete { doc_id } => {
            documents::run_delete(&cfg, &doc_id).await?;
        }
        Commands::Retrieve { question, top_k } => {
            ask::run_retrieve(&cfg, &question, top_k).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::Health => {
            health::run_health(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
