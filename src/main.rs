//! # RAG Sentinel CLI (`sentinel`)
//!
//! The `sentinel` binary is the operator interface for the guard layer.
//! It provides commands for database initialization, corpus ingestion,
//! baseline construction, guarded question answering, embedding-space
//! scanning, and retrieval-statistics inspection.
//!
//! ## Usage
//!
//! ```bash
//! sentinel --config ./config/sentinel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sentinel init` | Create the SQLite database and schema |
//! | `sentinel ingest` | Ingest the corpus with dedup, trust, and audit |
//! | `sentinel baseline` | Build the reference embedding for drift checks |
//! | `sentinel query "<question>"` | Run the guarded query pipeline |
//! | `sentinel scan` | Z-score outlier sweep over stored embeddings |
//! | `sentinel stats` | Show persisted retrieval statistics |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rag_sentinel::{config, guard, ingest, outlier, query, stats, store};

/// RAG Sentinel — a defense-in-depth guard layer for retrieval-augmented
/// generation pipelines.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sentinel.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sentinel",
    about = "RAG Sentinel — provenance, drift, outlier, and injection guards for RAG pipelines",
    version,
    long_about = "RAG Sentinel layers advisory security checks around a RAG pipeline: \
    content-hash deduplication and trust binding at ingestion, retrieval-pattern drift \
    tracking, embedding-space outlier scanning, and context guarding at query time. \
    Detections warn and are audited; they never block generation."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sentinel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest the document corpus.
    ///
    /// Scans the corpus directory, deduplicates by content hash, assigns
    /// trust levels, chunks and embeds new documents, and records every
    /// decision in the audit ledger.
    Ingest {
        /// Show document and chunk counts without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Build the baseline embedding used by the context guard.
    ///
    /// Embeds the designated reference text and writes the baseline file.
    /// Run once after choosing the reference document.
    Baseline {
        /// Reference text file (overrides baseline.source from config).
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Ask a question through the guarded query pipeline.
    ///
    /// Retrieval, trust reranking, drift tracking, context guarding, and
    /// mutation detection run before answer generation. Alerts warn but
    /// never block the answer.
    Query {
        /// The question to answer from the indexed corpus.
        question: String,

        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Scan stored embeddings for magnitude outliers.
    ///
    /// Batch z-score analysis over the norms of the full collection.
    /// Intended to run periodically, not per query.
    Scan {
        /// Z-score threshold (overrides guard.outlier_threshold from config).
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Show persisted retrieval statistics per source.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = store::VectorStore::connect(&cfg.db.path).await?;
            store.migrate().await?;
            store.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dry_run } => {
            ingest::run_ingest(&cfg, dry_run).await?;
        }
        Commands::Baseline { source } => {
            guard::run_baseline(&cfg, source.as_deref()).await?;
        }
        Commands::Query { question, top_k } => {
            query::run_query(&cfg, &question, top_k).await?;
        }
        Commands::Scan { threshold } => {
            outlier::run_scan(&cfg, threshold).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
    }

    Ok(())
}
