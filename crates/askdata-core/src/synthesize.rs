//! Answer synthesis.
//!
//! Merges retrieved text and query results into the final [`Answer`]:
//! coerces the evidence into the question's expected format, attaches
//! citations for every piece of evidence actually used, and computes the
//! heuristic confidence score.
//!
//! # Confidence
//!
//! `confidence = base + execution bonus (+ first-attempt bonus)
//! − repair penalty × repairs + retrieval weight × top score`, clamped
//! to `[0, 1]`, and exactly `0` when neither branch produced evidence.
//! The coefficients are tunable configuration, but their defaults keep
//! the required ordering: first-attempt success > repaired success >
//! document-only answer > terminal failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::executor::Execution;
use crate::models::{
    Answer, Citation, Constraints, Question, QueryResult, ResolvedChunk, RouteDecision,
};

/// Tunable coefficients for the confidence heuristic.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    /// Starting value once any evidence exists.
    pub base: f64,
    /// Added when query execution succeeded.
    pub execution_bonus: f64,
    /// Added on top when it succeeded on the first attempt.
    pub first_attempt_bonus: f64,
    /// Subtracted per repair attempt consumed.
    pub repair_penalty: f64,
    /// Multiplied by the top retrieval score when chunks are cited.
    pub retrieval_weight: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            base: 0.2,
            execution_bonus: 0.5,
            first_attempt_bonus: 0.2,
            repair_penalty: 0.1,
            retrieval_weight: 0.3,
        }
    }
}

impl ConfidenceWeights {
    /// Score one question's evidence. `top_score` is the best retrieval
    /// similarity and only counts when a chunk was actually cited.
    pub fn score(
        &self,
        execution: Option<&Execution>,
        cited_chunks: bool,
        top_score: f64,
    ) -> f64 {
        let attempted = execution.map(|e| !e.attempts.is_empty()).unwrap_or(false);
        if !attempted && !cited_chunks {
            return 0.0;
        }

        let mut conf = self.base;
        if let Some(exec) = execution {
            if exec.succeeded() {
                conf += self.execution_bonus;
                if exec.succeeded_first_try() {
                    conf += self.first_attempt_bonus;
                }
            }
            conf -= self.repair_penalty * exec.repairs_used() as f64;
        }
        if cited_chunks {
            conf += self.retrieval_weight * top_score;
        }
        conf.clamp(0.0, 1.0)
    }
}

/// The answer shape a question expects.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedFormat {
    Int,
    Float,
    /// `{key:type, …}` — one object built from the first row.
    Object(Vec<(String, FieldType)>),
    /// `list[{key:type, …}]` — one object per row.
    List(Vec<(String, FieldType)>),
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Text,
}

fn parse_fields(inner: &str) -> Vec<(String, FieldType)> {
    inner
        .split(',')
        .filter_map(|part| {
            let (key, ty) = part.split_once(':')?;
            let ty = ty.trim();
            let field_type = if ty.contains("int") {
                FieldType::Int
            } else if ty.contains("float") {
                FieldType::Float
            } else {
                FieldType::Text
            };
            Some((key.trim().to_string(), field_type))
        })
        .collect()
}

/// Parse a format hint like `"int"`, `"float_2"`,
/// `"{category:str, quantity:int}"`, or `"list[{product:str, revenue:float}]"`.
pub fn parse_format(hint: Option<&str>) -> ExpectedFormat {
    let hint = match hint {
        Some(h) if !h.trim().is_empty() => h.trim(),
        _ => return ExpectedFormat::Unspecified,
    };

    if hint == "int" {
        ExpectedFormat::Int
    } else if hint == "float" || hint == "float_2" {
        ExpectedFormat::Float
    } else if let Some(inner) = hint.strip_prefix('{').and_then(|h| h.strip_suffix('}')) {
        ExpectedFormat::Object(parse_fields(inner))
    } else if let Some(inner) = hint.strip_prefix("list[").and_then(|h| h.strip_suffix(']')) {
        match inner.strip_prefix('{').and_then(|h| h.strip_suffix('}')) {
            Some(obj) => ExpectedFormat::List(parse_fields(obj)),
            None => ExpectedFormat::Unspecified,
        }
    } else {
        ExpectedFormat::Unspecified
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Money rounds to 2 decimals.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn convert_field(value: &Value, field_type: FieldType) -> Value {
    match field_type {
        FieldType::Int => as_f64(value).map(|f| json!(f.trunc() as i64)).unwrap_or(Value::Null),
        FieldType::Float => as_f64(value).map(|f| json!(round2(f))).unwrap_or(Value::Null),
        FieldType::Text => match value {
            Value::String(s) => json!(s),
            other => json!(other.to_string()),
        },
    }
}

fn row_to_object(
    row: &serde_json::Map<String, Value>,
    fields: &[(String, FieldType)],
) -> Value {
    let mut out = serde_json::Map::new();
    for (key, field_type) in fields {
        let found = row
            .iter()
            .find(|(col, _)| col.eq_ignore_ascii_case(key))
            .map(|(_, v)| v);
        if let Some(v) = found {
            out.insert(key.clone(), convert_field(v, *field_type));
        }
    }
    Value::Object(out)
}

/// Coerce a query result into the expected output type. Counts truncate
/// to integers, money rounds to 2 decimals. Returns `Null` when the
/// result holds nothing usable.
pub fn coerce(format: &ExpectedFormat, result: &QueryResult) -> Value {
    if result.is_empty() {
        return Value::Null;
    }
    match format {
        ExpectedFormat::Int => result
            .first_value()
            .and_then(as_f64)
            .map(|f| json!(f.trunc() as i64))
            .unwrap_or(Value::Null),
        ExpectedFormat::Float => result
            .first_value()
            .and_then(as_f64)
            .map(|f| json!(round2(f)))
            .unwrap_or(Value::Null),
        ExpectedFormat::Object(fields) => row_to_object(&result.rows[0], fields),
        ExpectedFormat::List(fields) => Value::Array(
            result
                .rows
                .iter()
                .map(|row| row_to_object(row, fields))
                .collect(),
        ),
        ExpectedFormat::Unspecified => {
            if result.rows.len() == 1 && result.columns.len() == 1 {
                result.first_value().cloned().unwrap_or(Value::Null)
            } else {
                json!(result.rows)
            }
        }
    }
}

/// Vocabulary that marks a question answerable from policy documents.
const POLICY_CUES: &[&str] = &["return window", "return days", "policy"];

static DAYS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*-?\s*day").expect("days regex"));
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").expect("int regex"));

/// Pull an integer answer out of retrieved chunk text for a policy
/// question. Prefers a number attached to "day(s)"; falls back to the
/// first integer in the chunk.
fn extract_from_docs(question: &str, chunks: &[ResolvedChunk]) -> Option<(i64, String)> {
    let q = question.to_lowercase();
    if !POLICY_CUES.iter().any(|cue| q.contains(cue)) {
        return None;
    }
    for chunk in chunks {
        if let Some(caps) = DAYS_RE.captures(&chunk.text) {
            if let Ok(n) = caps[1].parse() {
                return Some((n, chunk.chunk_id.clone()));
            }
        }
    }
    for chunk in chunks {
        if let Some(caps) = INT_RE.captures(&chunk.text) {
            if let Ok(n) = caps[1].parse() {
                return Some((n, chunk.chunk_id.clone()));
            }
        }
    }
    None
}

/// Merge both branches' evidence into the final answer. Always produces
/// an [`Answer`]; total lack of evidence yields confidence 0 with empty
/// citations, never a failure.
pub fn synthesize(
    question: &Question,
    decision: &RouteDecision,
    retrieved: &[ResolvedChunk],
    constraints: Option<&Constraints>,
    execution: Option<&Execution>,
    weights: &ConfidenceWeights,
) -> Answer {
    let format = parse_format(question.format_hint.as_deref());
    let attempts = execution.map(|e| e.attempts.clone()).unwrap_or_default();

    let top_score = retrieved.first().map(|c| c.score).unwrap_or(0.0);

    // Data branch first: a successful execution is the strongest evidence.
    if let Some(exec) = execution {
        if let Some(result) = &exec.result {
            let value = coerce(&format, result);
            let mut citations: Vec<Citation> = constraints
                .map(|c| c.source_chunks.iter().cloned().map(Citation::Chunk).collect())
                .unwrap_or_default();
            let cited_chunks = !citations.is_empty();
            citations.push(Citation::Query);

            let confidence = weights.score(execution, cited_chunks, top_score);
            let explanation = if exec.repairs_used() == 0 {
                format!("Derived from query results via the {} route.", decision.route.as_str())
            } else {
                format!(
                    "Derived from query results after {} repair attempt(s).",
                    exec.repairs_used()
                )
            };
            return Answer {
                value,
                confidence,
                citations,
                attempts,
                explanation,
            };
        }
    }

    // Document branch: answer from chunk text when the question allows it.
    if let Some((n, chunk_id)) = extract_from_docs(&question.text, retrieved) {
        let confidence = weights.score(execution, true, top_score);
        return Answer {
            value: json!(n),
            confidence,
            citations: vec![Citation::Chunk(chunk_id.clone())],
            attempts,
            explanation: format!("Extracted from document chunk {}.", chunk_id),
        };
    }

    // Nothing usable from either branch.
    let confidence = weights.score(execution, false, 0.0);
    let explanation = match execution {
        Some(exec) => format!(
            "Query execution failed after {} attempt(s); no answer could be derived.",
            exec.attempts.len()
        ),
        None => "No evidence available; no query was executed and no document matched.".to_string(),
    };
    Answer {
        value: Value::Null,
        confidence,
        citations: Vec::new(),
        attempts,
        explanation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Route, Row, SqlAttempt};

    fn scalar_result(column: &str, value: Value) -> QueryResult {
        let mut row = Row::new();
        row.insert(column.to_string(), value);
        QueryResult {
            columns: vec![column.to_string()],
            rows: vec![row],
        }
    }

    fn success(attempts: usize) -> Execution {
        Execution {
            attempts: (1..=attempts as u32)
                .map(|n| SqlAttempt {
                    sql: "SELECT 1".into(),
                    attempt: n,
                    error: (n < attempts as u32).then(|| "err".into()),
                })
                .collect(),
            result: Some(scalar_result("revenue", json!(20.0))),
        }
    }

    fn failure() -> Execution {
        Execution {
            attempts: (1..=3)
                .map(|n| SqlAttempt {
                    sql: "SELECT 1".into(),
                    attempt: n,
                    error: Some("err".into()),
                })
                .collect(),
            result: None,
        }
    }

    fn decision(route: Route) -> RouteDecision {
        RouteDecision {
            route,
            rationale: "test".into(),
        }
    }

    #[test]
    fn test_parse_scalar_formats() {
        assert_eq!(parse_format(Some("int")), ExpectedFormat::Int);
        assert_eq!(parse_format(Some("float")), ExpectedFormat::Float);
        assert_eq!(parse_format(Some("float_2")), ExpectedFormat::Float);
        assert_eq!(parse_format(None), ExpectedFormat::Unspecified);
    }

    #[test]
    fn test_parse_object_format() {
        let f = parse_format(Some("{category:str, quantity:int}"));
        match f {
            ExpectedFormat::Object(fields) => {
                assert_eq!(fields[0], ("category".to_string(), FieldType::Text));
                assert_eq!(fields[1], ("quantity".to_string(), FieldType::Int));
            }
            other => panic!("unexpected format: {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_format() {
        let f = parse_format(Some("list[{product:str, revenue:float}]"));
        assert!(matches!(f, ExpectedFormat::List(_)));
    }

    #[test]
    fn test_coerce_money_rounds_to_two_decimals() {
        let result = scalar_result("revenue", json!(1234.5678));
        assert_eq!(coerce(&ExpectedFormat::Float, &result), json!(1234.57));
    }

    #[test]
    fn test_coerce_count_truncates() {
        let result = scalar_result("quantity", json!(42.9));
        assert_eq!(coerce(&ExpectedFormat::Int, &result), json!(42));
    }

    #[test]
    fn test_coerce_object_maps_columns_case_insensitive() {
        let mut row = Row::new();
        row.insert("Category".into(), json!("Beverages"));
        row.insert("Quantity".into(), json!(100.0));
        let result = QueryResult {
            columns: vec!["Category".into(), "Quantity".into()],
            rows: vec![row],
        };
        let f = parse_format(Some("{category:str, quantity:int}"));
        assert_eq!(
            coerce(&f, &result),
            json!({"category": "Beverages", "quantity": 100})
        );
    }

    #[test]
    fn test_coerce_empty_result_is_null() {
        assert_eq!(coerce(&ExpectedFormat::Float, &QueryResult::default()), Value::Null);
    }

    #[test]
    fn test_confidence_ordering() {
        let w = ConfidenceWeights::default();
        let first = w.score(Some(&success(1)), false, 0.0);
        let repaired = w.score(Some(&success(2)), false, 0.0);
        let docs_only = w.score(None, true, 0.9);
        let failed = w.score(Some(&failure()), false, 0.0);

        assert!(first > repaired, "{first} vs {repaired}");
        assert!(repaired > docs_only, "{repaired} vs {docs_only}");
        assert!(docs_only > failed, "{docs_only} vs {failed}");
        for c in [first, repaired, docs_only, failed] {
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn test_confidence_zero_without_evidence() {
        let w = ConfidenceWeights::default();
        assert_eq!(w.score(None, false, 0.0), 0.0);
    }

    #[test]
    fn test_synthesize_success_cites_query_marker() {
        let q = Question::new("q1", "What was total revenue in 1997?").with_format("float");
        let exec = success(1);
        let answer = synthesize(&q, &decision(Route::DataOnly), &[], None, Some(&exec), &ConfidenceWeights::default());
        assert_eq!(answer.value, json!(20.0));
        assert_eq!(answer.citations, vec![Citation::Query]);
        assert!(answer.confidence > 0.2);
    }

    #[test]
    fn test_synthesize_repaired_success_scores_lower() {
        let q = Question::new("q1", "total revenue in 1997").with_format("float");
        let w = ConfidenceWeights::default();
        let one = synthesize(&q, &decision(Route::DataOnly), &[], None, Some(&success(1)), &w);
        let two = synthesize(&q, &decision(Route::DataOnly), &[], None, Some(&success(2)), &w);
        assert!(two.confidence < one.confidence);
        assert_eq!(two.attempts.len(), 2);
    }

    #[test]
    fn test_synthesize_docs_only_policy_answer() {
        let q = Question::new("q2", "What is the return window for unopened beverages?");
        let chunks = vec![ResolvedChunk {
            chunk_id: "product_policy::chunk0".into(),
            score: 0.8,
            text: "Unopened beverages may be returned within 14 days of purchase.".into(),
        }];
        let answer = synthesize(&q, &decision(Route::DocsOnly), &chunks, None, None, &ConfidenceWeights::default());
        assert_eq!(answer.value, json!(14));
        assert_eq!(
            answer.citations,
            vec![Citation::Chunk("product_policy::chunk0".into())]
        );
        assert!(answer.confidence > 0.0);
    }

    #[test]
    fn test_synthesize_no_evidence_yields_zero_confidence() {
        let q = Question::new("q3", "Compare shipping speed by region in 1997");
        let answer = synthesize(&q, &decision(Route::DataOnly), &[], None, None, &ConfidenceWeights::default());
        assert_eq!(answer.value, Value::Null);
        assert_eq!(answer.confidence, 0.0);
        assert!(answer.citations.is_empty());
    }
}
