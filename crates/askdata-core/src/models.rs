//! Core data models for the question-answering pipeline.
//!
//! These types flow between the pipeline stages: a [`Question`] enters,
//! a [`RouteDecision`] selects the branches, retrieval produces a
//! [`RetrievalResult`], planning produces [`Constraints`], execution
//! produces [`SqlAttempt`]s and a [`QueryResult`], and synthesis produces
//! the final [`Answer`]. All of them are plain data; none is mutated
//! after the stage that created it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A natural-language analytics question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Caller-assigned unique id, echoed into the output record.
    pub id: String,
    /// Raw question text.
    pub text: String,
    /// Expected answer shape, e.g. `"int"`, `"float"`,
    /// `"{category:str, quantity:int}"`, `"list[{product:str, revenue:float}]"`.
    #[serde(default)]
    pub format_hint: Option<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            format_hint: None,
        }
    }

    pub fn with_format(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }
}

/// Which branches of the pipeline a question needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Answerable from the document corpus alone.
    DocsOnly,
    /// Answerable from the relational store alone.
    DataOnly,
    /// Needs document context (dates, definitions) and a query.
    Hybrid,
}

impl Route {
    /// Whether the retrieval branch runs for this route.
    pub fn needs_docs(self) -> bool {
        matches!(self, Route::DocsOnly | Route::Hybrid)
    }

    /// Whether the query-builder/executor branch runs for this route.
    pub fn needs_data(self) -> bool {
        matches!(self, Route::DataOnly | Route::Hybrid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Route::DocsOnly => "docs_only",
            Route::DataOnly => "data_only",
            Route::Hybrid => "hybrid",
        }
    }
}

/// The router's classification of a question, produced exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDecision {
    pub route: Route,
    /// Human-readable justification, recorded in the trace.
    pub rationale: String,
}

/// A paragraph-level unit of a source document.
///
/// Chunk ids take the form `"{source}::chunk{ordinal}"` and are the unit
/// of citation. Chunks are created at index build time and never change
/// for the lifetime of an index.
#[derive(Debug, Clone)]
pub struct DocChunk {
    pub id: String,
    /// Identifier of the source document this chunk came from.
    pub source: String,
    /// Zero-based paragraph position within the source document.
    pub ordinal: usize,
    pub text: String,
}

/// One retrieval hit: a chunk id and its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub score: f64,
}

/// Top-k retrieval hits, highest score first, ties broken by ascending
/// source id then paragraph ordinal. Empty is a valid result, not an
/// error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Similarity of the best hit, or `None` when empty.
    pub fn top_score(&self) -> Option<f64> {
        self.hits.first().map(|h| h.score)
    }
}

/// A retrieval hit resolved against the index, carrying the chunk text.
///
/// The planner and synthesizer read chunk content through this type so
/// they never hold a reference into the index itself.
#[derive(Debug, Clone)]
pub struct ResolvedChunk {
    pub chunk_id: String,
    pub score: f64,
    pub text: String,
}

/// An inclusive date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The full calendar year as an inclusive range.
    pub fn full_year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }
}

/// Recognized aggregate metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    UnitCount,
    AverageOrderValue,
    GrossMargin,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::UnitCount => "unit_count",
            Metric::AverageOrderValue => "aov",
            Metric::GrossMargin => "gross_margin",
        }
    }
}

/// Recognized question shapes, each mapping to one query template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TopCategoryByQuantity,
    AverageOrderValue,
    GrossMarginByCustomer,
    GrossMarginTotal,
    TopProductsByRevenue,
    CategoryRevenue,
    /// Pure document question (e.g. a policy lookup); no query is built.
    ReturnPolicy,
    Unknown,
}

/// Structured filters and metric specification extracted from a question.
///
/// Built once by the planner and never patched afterwards; if the repair
/// loop needs different constraints it rebuilds the query text, not this.
#[derive(Debug, Clone, Serialize)]
pub struct Constraints {
    pub intent: Intent,
    /// Inclusive date filter, when one was recognized.
    pub dates: Option<DateRange>,
    /// Category equality filter, from the fixed category vocabulary.
    pub category: Option<String>,
    pub metric: Option<Metric>,
    /// Row limit for ranking intents ("top 3" → 3). Defaults to 1.
    pub limit: usize,
    /// Free-text evidence lines carried from retrieved chunks
    /// (e.g. the campaign date line a range was parsed from).
    pub hints: Vec<String>,
    /// Ids of chunks whose content contributed a constraint.
    pub source_chunks: Vec<String>,
}

/// One attempt at executing a query: the text, its 1-based attempt
/// number, and the error message when it failed.
#[derive(Debug, Clone, Serialize)]
pub struct SqlAttempt {
    pub sql: String,
    pub attempt: u32,
    pub error: Option<String>,
}

impl SqlAttempt {
    pub fn first(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            attempt: 1,
            error: None,
        }
    }
}

/// A single result row: column name → scalar value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Ordered row set returned by the relational store.
///
/// `columns` preserves result order; rows are keyed by column name.
/// An empty `rows` is a valid, non-error result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of the first column of the first row, the usual location of
    /// a scalar aggregate.
    pub fn first_value(&self) -> Option<&serde_json::Value> {
        let col = self.columns.first()?;
        self.rows.first()?.get(col)
    }
}

/// A provenance marker on an [`Answer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Citation {
    /// A document chunk whose content was used.
    Chunk(String),
    /// The relational query contributed to the answer.
    Query,
}

impl Citation {
    pub fn as_str(&self) -> &str {
        match self {
            Citation::Chunk(id) => id,
            Citation::Query => "query:executed",
        }
    }
}

impl Serialize for Citation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The final synthesized answer. The pipeline always produces one, even
/// on total failure (confidence 0, empty citations).
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Typed value per the question's format hint; `null` when nothing
    /// could be derived.
    pub value: serde_json::Value,
    /// Heuristic reliability estimate in `[0, 1]`.
    pub confidence: f64,
    pub citations: Vec<Citation>,
    /// Every query attempt consumed, in order.
    pub attempts: Vec<SqlAttempt>,
    /// One-line account of how the value was derived.
    pub explanation: String,
}

/// One step of a question's run, for observability.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub step: String,
    pub at: chrono::DateTime<chrono::Utc>,
    pub input: String,
    pub output: String,
    pub duration_ms: u64,
}

/// Everything the pipeline produced for one question: the externally
/// observable unit a batch runner persists.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub question_id: String,
    pub route: RouteDecision,
    pub answer: Answer,
    pub trace: Vec<TraceEntry>,
}

/// An opaque text document fed to the index builder.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_branches() {
        assert!(Route::DocsOnly.needs_docs());
        assert!(!Route::DocsOnly.needs_data());
        assert!(Route::DataOnly.needs_data());
        assert!(!Route::DataOnly.needs_docs());
        assert!(Route::Hybrid.needs_docs() && Route::Hybrid.needs_data());
    }

    #[test]
    fn test_full_year_range() {
        let r = DateRange::full_year(1997).unwrap();
        assert_eq!(r.start, NaiveDate::from_ymd_opt(1997, 1, 1).unwrap());
        assert_eq!(r.end, NaiveDate::from_ymd_opt(1997, 12, 31).unwrap());
    }

    #[test]
    fn test_citation_marker() {
        assert_eq!(Citation::Query.as_str(), "query:executed");
        assert_eq!(
            Citation::Chunk("policy::chunk0".into()).as_str(),
            "policy::chunk0"
        );
    }

    #[test]
    fn test_query_result_first_value() {
        let mut row = Row::new();
        row.insert("revenue".into(), serde_json::json!(20.0));
        let qr = QueryResult {
            columns: vec!["revenue".into()],
            rows: vec![row],
        };
        assert_eq!(qr.first_value(), Some(&serde_json::json!(20.0)));
        assert!(QueryResult::default().first_value().is_none());
    }
}
