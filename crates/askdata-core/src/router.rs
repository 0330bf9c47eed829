//! Rule-based question router.
//!
//! Classifies a question into docs-only, data-only, or hybrid by matching
//! two fixed pattern sets: one indicative of structured-data intent
//! (aggregation verbs, metric nouns, temporal expressions, comparisons)
//! and one indicative of document intent (policies, definitions, campaign
//! names).
//!
//! Decision policy, in priority order:
//!
//! 1. data patterns match, document patterns do not → `DataOnly`
//! 2. both match → `Hybrid`
//! 3. only document patterns match → `DocsOnly`
//! 4. neither matches → `Hybrid` — most analytics questions need data,
//!    and routing toward execution is safer than silently answering from
//!    documents alone.
//!
//! A pluggable classifier (see [`crate::plugins`]) may override rules 1–3,
//! but rule 4 remains the fallback whenever the plugin is absent or fails.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Route, RouteDecision};

/// Aggregation verbs, metric nouns, and comparison words that signal a
/// structured query is needed.
const DATA_PATTERNS: &[&str] = &[
    "total",
    "sum",
    "average",
    "count",
    "how many",
    "how much",
    "top",
    "highest",
    "lowest",
    "best",
    "most",
    "revenue",
    "gross margin",
    "margin",
    "aov",
    "average order value",
    "quantity",
    "sold",
    "units",
    "orders",
    "per order",
    "by category",
    "by customer",
];

/// Policy, definition, and campaign vocabulary that signals document
/// context is needed.
const DOC_PATTERNS: &[&str] = &[
    "policy",
    "what is",
    "definition",
    "define",
    "return window",
    "return days",
    "campaign",
    "summer beverages",
    "winter classics",
    "guideline",
    "according to",
];

/// A bare 4-digit year counts as a temporal data signal.
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year regex"));

fn matched<'a>(haystack: &str, patterns: &[&'a str]) -> Vec<&'a str> {
    patterns
        .iter()
        .filter(|p| haystack.contains(*p))
        .copied()
        .collect()
}

/// Classify a question into one of the three routes.
///
/// Deterministic: the same text always yields the same decision. The
/// rationale names the patterns that fired, for the trace.
pub fn classify(question: &str) -> RouteDecision {
    let q = question.to_lowercase();

    let mut data_hits = matched(&q, DATA_PATTERNS);
    if YEAR_RE.is_match(&q) {
        data_hits.push("<year>");
    }
    let doc_hits = matched(&q, DOC_PATTERNS);

    match (data_hits.is_empty(), doc_hits.is_empty()) {
        (false, true) => RouteDecision {
            route: Route::DataOnly,
            rationale: format!("data patterns only: {}", data_hits.join(", ")),
        },
        (false, false) => RouteDecision {
            route: Route::Hybrid,
            rationale: format!(
                "data patterns ({}) and document patterns ({})",
                data_hits.join(", "),
                doc_hits.join(", ")
            ),
        },
        (true, false) => RouteDecision {
            route: Route::DocsOnly,
            rationale: format!("document patterns only: {}", doc_hits.join(", ")),
        },
        (true, true) => RouteDecision {
            route: Route::Hybrid,
            rationale: "no pattern matched; defaulting to hybrid".to_string(),
        },
    }
}
