//! Pipeline orchestration.
//!
//! Runs one question through the full stage sequence:
//!
//! ```text
//! Router → (Retriever) → Planner → (Query Builder → Executor) → Synthesizer
//! ```
//!
//! The retrieval branch runs only for docs-only/hybrid routes and the
//! data branch only for data-only/hybrid routes. Failures inside one
//! branch never abort the other: a declined query build skips the
//! executor, a terminal execution failure still reaches the synthesizer,
//! and an empty retrieval is ordinary data. The only hard failure is an
//! empty question.
//!
//! Stages are strictly sequential within a question — the planner needs
//! the router's decision and the retriever's output, the executor needs
//! the builder's query — but independent questions share nothing mutable
//! and may run concurrently against the same index and store.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::executor::{self, Execution};
use crate::index::DocumentIndex;
use crate::models::{
    Constraints, Question, ResolvedChunk, RouteDecision, RunReport, SqlAttempt,
};
use crate::planner;
use crate::plugins::Plugins;
use crate::router;
use crate::sqlgen;
use crate::store::Database;
use crate::synthesize::{self, parse_format, ConfidenceWeights};
use crate::trace::Trace;

/// Per-pipeline tuning, threaded explicitly rather than held as ambient
/// process state.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of chunks the retriever returns.
    pub top_k: usize,
    /// Total query attempts the executor may use, repairs included.
    pub max_attempts: u32,
    pub weights: ConfidenceWeights,
    /// Short table description handed to a pluggable query generator.
    pub schema_hint: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_attempts: executor::MAX_ATTEMPTS,
            weights: ConfidenceWeights::default(),
            schema_hint: String::new(),
        }
    }
}

/// The deterministic decision pipeline. Cheap to clone per question;
/// the index and store are shared read-only.
#[derive(Clone)]
pub struct Pipeline {
    index: Arc<DocumentIndex>,
    db: Arc<dyn Database>,
    plugins: Plugins,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(index: Arc<DocumentIndex>, db: Arc<dyn Database>) -> Self {
        Self {
            index,
            db,
            plugins: Plugins::none(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_plugins(mut self, plugins: Plugins) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Route via the pluggable classifier when one is attached, falling
    /// back to the rule set (and its default-to-hybrid) on absence or
    /// failure.
    fn route(&self, text: &str) -> RouteDecision {
        if let Some(classifier) = &self.plugins.classifier {
            match classifier.classify(text) {
                Ok(decision) => return decision,
                Err(err) => warn!(error = %err, "pluggable classifier failed; using rule-based router"),
            }
        }
        router::classify(text)
    }

    fn build_query(&self, constraints: &Constraints) -> Result<SqlAttempt, PipelineError> {
        if let Some(generator) = &self.plugins.generator {
            match generator.generate(constraints, &self.options.schema_hint) {
                Ok(attempt) => return Ok(attempt),
                Err(err) => warn!(error = %err, "pluggable generator failed; using template builder"),
            }
        }
        sqlgen::build(constraints)
    }

    /// Run one question end to end. Always yields a report with an
    /// answer unless the question itself is empty.
    pub async fn run(&self, question: &Question) -> Result<RunReport, PipelineError> {
        if question.text.trim().is_empty() {
            return Err(PipelineError::InvalidQuestion);
        }

        let mut trace = Trace::new();
        info!(id = %question.id, "running question");

        let started = Instant::now();
        let decision = self.route(&question.text);
        trace.record(
            "router",
            started,
            &question.text,
            format!("{}: {}", decision.route.as_str(), decision.rationale),
        );

        let mut retrieved: Vec<ResolvedChunk> = Vec::new();
        if decision.route.needs_docs() {
            let started = Instant::now();
            let retrieval = self.index.query(&question.text, self.options.top_k);
            retrieved = self.index.resolve(&retrieval);
            debug!(hits = retrieved.len(), "retrieval complete");
            trace.record(
                "retriever",
                started,
                format!("k={}", self.options.top_k),
                format!(
                    "{} hit(s), top score {:.3}",
                    retrieved.len(),
                    retrieval.top_score().unwrap_or(0.0)
                ),
            );
        }

        let started = Instant::now();
        let constraints = planner::extract(&question.text, &retrieved);
        trace.record(
            "planner",
            started,
            format!("question + {} chunk(s)", retrieved.len()),
            format!(
                "intent={:?} metric={:?} dates={:?} category={:?} limit={}",
                constraints.intent,
                constraints.metric,
                constraints.dates,
                constraints.category,
                constraints.limit
            ),
        );

        let mut execution: Option<Execution> = None;
        if decision.route.needs_data() {
            let started = Instant::now();
            match self.build_query(&constraints) {
                Ok(attempt) => {
                    trace.record("query_builder", started, "constraints", attempt.sql.clone());

                    let started = Instant::now();
                    let exec =
                        executor::execute(self.db.as_ref(), attempt, self.options.max_attempts)
                            .await;
                    if let Some(err) = exec.failure() {
                        warn!(id = %question.id, error = %err, "query branch failed terminally");
                    }
                    trace.record(
                        "executor",
                        started,
                        format!("{} attempt(s)", exec.attempts.len()),
                        match &exec.result {
                            Some(r) => format!("success: {} row(s)", r.rows.len()),
                            None => format!("failure: {}", exec.last_error().unwrap_or("unknown")),
                        },
                    );
                    execution = Some(exec);
                }
                Err(err) => {
                    // Executor branch skipped; synthesis degrades gracefully.
                    debug!(id = %question.id, error = %err, "query builder declined");
                    trace.record("query_builder", started, "constraints", format!("declined: {err}"));
                }
            }
        }

        let started = Instant::now();
        let mut answer = synthesize::synthesize(
            question,
            &decision,
            &retrieved,
            Some(&constraints),
            execution.as_ref(),
            &self.options.weights,
        );

        if let (Some(formatter), Some(exec)) = (&self.plugins.formatter, execution.as_ref()) {
            if let Some(result) = &exec.result {
                let format = parse_format(question.format_hint.as_deref());
                match formatter.format(&format, result) {
                    Ok(value) => answer.value = value,
                    Err(err) => {
                        warn!(error = %err, "pluggable formatter failed; keeping deterministic value")
                    }
                }
            }
        }
        trace.record(
            "synthesizer",
            started,
            format!("format_hint={:?}", question.format_hint),
            format!(
                "confidence={:.2}, {} citation(s)",
                answer.confidence,
                answer.citations.len()
            ),
        );

        Ok(RunReport {
            question_id: question.id.clone(),
            route: decision,
            answer,
            trace: trace.into_entries(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Citation, Route, SourceDocument};
    use crate::store::memory::MemoryDatabase;
    use serde_json::json;

    fn corpus_index() -> Arc<DocumentIndex> {
        Arc::new(DocumentIndex::build(
            &[
                SourceDocument::new(
                    "product_policy",
                    "Return policy: unopened beverages may be returned within 14 days.",
                ),
                SourceDocument::new(
                    "marketing_calendar",
                    "Summer Beverages campaign. Dates: 1997-06-01 to 1997-06-30.",
                ),
            ],
            crate::chunk::DEFAULT_MAX_TOKENS,
        ))
    }

    #[tokio::test]
    async fn test_data_only_revenue_question() {
        let db = Arc::new(MemoryDatabase::new());
        db.push_scalar("revenue", json!(20.0));
        let pipeline = Pipeline::new(corpus_index(), db);

        let q = Question::new("a1", "What was total revenue in 1997?").with_format("float");
        let report = pipeline.run(&q).await.unwrap();

        assert_eq!(report.route.route, Route::DataOnly);
        assert_eq!(report.answer.value, json!(20.0));
        assert_eq!(report.answer.attempts.len(), 1);
        assert_eq!(report.answer.citations, vec![Citation::Query]);
        assert!(report.answer.confidence > 0.2);
    }

    #[tokio::test]
    async fn test_unrecognized_metric_degrades_gracefully() {
        let db = Arc::new(MemoryDatabase::new());
        let pipeline = Pipeline::new(corpus_index(), db.clone());

        let q = Question::new("b1", "Compare shipping speed by region in 1997");
        let report = pipeline.run(&q).await.unwrap();

        assert_eq!(report.answer.confidence, 0.0);
        assert!(report.answer.citations.is_empty());
        assert!(report.answer.attempts.is_empty());
        // The executor branch was skipped entirely.
        assert!(db.seen_queries().is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_campaign_question_uses_chunk_dates() {
        let db = Arc::new(MemoryDatabase::new());
        db.push_scalar("revenue", json!(1234.5));
        let pipeline = Pipeline::new(corpus_index(), db.clone());

        let q = Question::new("h1", "What was revenue during the Summer Beverages campaign?")
            .with_format("float");
        let report = pipeline.run(&q).await.unwrap();

        assert_eq!(report.route.route, Route::Hybrid);
        let sql = &db.seen_queries()[0];
        assert!(sql.contains("BETWEEN '1997-06-01' AND '1997-06-30'"), "{sql}");
        assert!(report
            .answer
            .citations
            .iter()
            .any(|c| matches!(c, Citation::Chunk(id) if id.starts_with("marketing_calendar"))));
        assert!(report.answer.citations.contains(&Citation::Query));
    }

    #[tokio::test]
    async fn test_docs_only_question_never_touches_the_store() {
        let db = Arc::new(MemoryDatabase::new());
        let pipeline = Pipeline::new(corpus_index(), db.clone());

        let q = Question::new("d1", "What is the return window for unopened beverages per policy?");
        let report = pipeline.run(&q).await.unwrap();

        assert_eq!(report.route.route, Route::DocsOnly);
        assert_eq!(report.answer.value, json!(14));
        assert!(db.seen_queries().is_empty());
        assert!(report
            .answer
            .citations
            .iter()
            .all(|c| matches!(c, Citation::Chunk(_))));
    }

    #[tokio::test]
    async fn test_empty_question_fails_fast() {
        let db = Arc::new(MemoryDatabase::new());
        let pipeline = Pipeline::new(corpus_index(), db);

        let err = pipeline.run(&Question::new("e1", "   ")).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidQuestion));
    }

    #[tokio::test]
    async fn test_failing_classifier_falls_back_to_rules() {
        struct Broken;
        impl crate::plugins::QuestionClassifier for Broken {
            fn classify(&self, _q: &str) -> anyhow::Result<RouteDecision> {
                anyhow::bail!("model unavailable")
            }
        }

        let db = Arc::new(MemoryDatabase::new());
        let pipeline = Pipeline::new(corpus_index(), db).with_plugins(Plugins {
            classifier: Some(Arc::new(Broken)),
            ..Plugins::none()
        });

        let report = pipeline
            .run(&Question::new("c1", "Tell me something interesting."))
            .await
            .unwrap();
        // Default-to-hybrid survives a broken plugin.
        assert_eq!(report.route.route, Route::Hybrid);
    }

    #[tokio::test]
    async fn test_terminal_query_failure_still_answers() {
        let db = Arc::new(MemoryDatabase::new());
        for _ in 0..3 {
            db.push_error("disk I/O error");
        }
        let pipeline = Pipeline::new(corpus_index(), db);

        let q = Question::new("f1", "What was total revenue in 1997?").with_format("float");
        let report = pipeline.run(&q).await.unwrap();

        assert_eq!(report.answer.value, serde_json::Value::Null);
        assert_eq!(report.answer.attempts.len(), 3);
        assert!(report.answer.confidence < 0.2);
    }

    #[tokio::test]
    async fn test_trace_covers_every_stage() {
        let db = Arc::new(MemoryDatabase::new());
        db.push_scalar("revenue", json!(1.0));
        let pipeline = Pipeline::new(corpus_index(), db);

        let q = Question::new("t1", "What was total revenue in 1997?");
        let report = pipeline.run(&q).await.unwrap();

        let steps: Vec<&str> = report.trace.iter().map(|e| e.step.as_str()).collect();
        assert_eq!(
            steps,
            vec!["router", "planner", "query_builder", "executor", "synthesizer"]
        );
    }
}
