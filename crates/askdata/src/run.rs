//! Command implementations for the `askdata` binary.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info};

use askdata_core::models::Question;
use askdata_core::pipeline::{Pipeline, PipelineOptions};
use askdata_core::store::Database;

use crate::config::Config;
use crate::corpus;
use crate::db;
use crate::sqlite_db::SqliteDatabase;

/// Table summary handed to pluggable query generators.
const SCHEMA_HINT: &str = "Orders(OrderID, CustomerID, OrderDate); \
    \"Order Details\"(OrderID, ProductID, UnitPrice, Quantity, Discount); \
    Products(ProductID, ProductName, CategoryID); \
    Categories(CategoryID, CategoryName); \
    Customers(CustomerID, CompanyName)";

pub async fn build_pipeline(cfg: &Config) -> Result<Pipeline> {
    let index = Arc::new(corpus::build_index(&cfg.corpus.dir, cfg.corpus.max_tokens)?);
    let pool = db::connect(&cfg.db.path).await?;
    let store: Arc<dyn Database> = Arc::new(SqliteDatabase::new(
        pool,
        Duration::from_millis(cfg.executor.timeout_ms),
    ));
    Ok(
        Pipeline::new(index, store).with_options(PipelineOptions {
            top_k: cfg.retrieval.top_k,
            max_attempts: cfg.executor.max_attempts,
            weights: cfg.confidence.clone(),
            schema_hint: SCHEMA_HINT.to_string(),
        }),
    )
}

/// Answer a single question and print the result as JSON. With `trace`
/// the full per-stage run report is printed instead of just the answer.
pub async fn run_ask(
    cfg: &Config,
    text: &str,
    format_hint: Option<String>,
    trace: bool,
) -> Result<()> {
    let pipeline = build_pipeline(cfg).await?;

    let mut question = Question::new(uuid::Uuid::new_v4().to_string(), text);
    question.format_hint = format_hint;

    let report = pipeline.run(&question).await?;
    if trace {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&report.answer)?);
    }
    Ok(())
}

/// One line of a batch input file.
#[derive(Debug, Deserialize)]
struct BatchLine {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "text")]
    question: String,
    #[serde(default)]
    format_hint: Option<String>,
}

/// Answer every question in a JSONL file, one run report per output
/// line, in input order. Questions run concurrently; a question that
/// fails (e.g. empty text) produces an error record rather than
/// aborting the batch.
pub async fn run_batch(cfg: &Config, input: &Path, output: Option<&Path>) -> Result<()> {
    let pipeline = build_pipeline(cfg).await?;

    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read batch file: {}", input.display()))?;

    let mut handles = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: BatchLine = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON on line {}", lineno + 1))?;

        let mut question = Question::new(
            parsed
                .id
                .unwrap_or_else(|| format!("line-{}", lineno + 1)),
            parsed.question,
        );
        question.format_hint = parsed.format_hint;

        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let id = question.id.clone();
            (id, pipeline.run(&question).await)
        }));
    }

    let mut records: Vec<serde_json::Value> = Vec::with_capacity(handles.len());
    let mut failures = 0usize;
    for handle in handles {
        let (id, result) = handle.await?;
        match result {
            Ok(report) => records.push(serde_json::to_value(&report)?),
            Err(err) => {
                failures += 1;
                error!(id = %id, error = %err, "question rejected");
                records.push(serde_json::json!({
                    "question_id": id,
                    "error": err.to_string(),
                }));
            }
        }
    }

    let mut out = String::new();
    for record in &records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    match output {
        Some(path) => std::fs::write(path, &out)
            .with_context(|| format!("Failed to write output file: {}", path.display()))?,
        None => print!("{out}"),
    }

    info!(
        answered = records.len() - failures,
        rejected = failures,
        "batch complete"
    );
    Ok(())
}

/// Print the user tables visible in the configured database.
pub async fn run_tables(cfg: &Config) -> Result<()> {
    let pool = db::connect(&cfg.db.path).await?;
    let store = SqliteDatabase::new(pool, Duration::from_millis(cfg.executor.timeout_ms));
    for table in store.list_tables().await? {
        println!("{table}");
    }
    Ok(())
}
