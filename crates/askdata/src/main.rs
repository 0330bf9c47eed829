//! # AskData CLI (`askdata`)
//!
//! The `askdata` binary answers analytics questions against a document
//! corpus and a SQLite database using a fully deterministic pipeline.
//!
//! ## Usage
//!
//! ```bash
//! askdata --config ./config/askdata.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdata ask "<question>"` | Answer one question, printing the answer as JSON |
//! | `askdata batch <file.jsonl>` | Answer every question in a JSONL file |
//! | `askdata tables` | List the tables visible in the configured database |
//!
//! ## Examples
//!
//! ```bash
//! # One-off question with an expected shape
//! askdata ask "What was total revenue in 1997?" --format float
//!
//! # Full per-stage trace for debugging
//! askdata ask "Which category sold the most units in 1997?" --trace
//!
//! # Batch run, one JSON record per output line
//! askdata batch questions.jsonl --output answers.jsonl
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use askdata::{config, run};

/// AskData — deterministic hybrid question answering over documents
/// and SQL.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/askdata.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "askdata",
    about = "AskData — deterministic hybrid question answering over documents and SQL",
    version,
    long_about = "AskData routes each analytics question between a TF-IDF document index and a \
    SQLite database, extracts query constraints from the question and retrieved text, executes \
    a templated SQL query with a bounded self-repair loop, and synthesizes a typed answer with \
    citations and a confidence score."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/askdata.toml`. Database, corpus, retrieval,
    /// and confidence settings are read from this file.
    #[arg(long, global = true, default_value = "./config/askdata.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Answer a single question.
    ///
    /// Routes the question, retrieves supporting documents, runs any
    /// needed SQL, and prints the synthesized answer as JSON.
    Ask {
        /// The question text.
        question: String,

        /// Expected answer shape: `int`, `float`, `{field:type, ...}`,
        /// or `list[{field:type, ...}]`.
        #[arg(long)]
        format: Option<String>,

        /// Print the full run report including the per-stage trace.
        #[arg(long)]
        trace: bool,
    },

    /// Answer every question in a JSONL file.
    ///
    /// Each input line is `{"id": ..., "question": ..., "format_hint": ...}`
    /// (`id` and `format_hint` optional). Questions run concurrently and
    /// results are written in input order, one JSON record per line.
    Batch {
        /// Path to the JSONL input file.
        input: PathBuf,

        /// Write results here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List the tables visible in the configured database.
    Tables,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ask {
            question,
            format,
            trace,
        } => {
            run::run_ask(&cfg, &question, format, trace).await?;
        }
        Commands::Batch { input, output } => {
            run::run_batch(&cfg, &input, output.as_deref()).await?;
        }
        Commands::Tables => {
            run::run_tables(&cfg).await?;
        }
    }

    Ok(())
}
