//! Optional pluggable capabilities.
//!
//! A learned classifier, query generator, or answer formatter may be
//! attached to the pipeline at configuration time. Each is called
//! through a narrow functional contract with the same input/output shape
//! as the deterministic path, and the pipeline tolerates absence or
//! failure by falling back to the rule-based implementation — the core
//! never depends on a plugin for correctness.

use std::sync::Arc;

use anyhow::Result;

use crate::models::{Constraints, QueryResult, RouteDecision, SqlAttempt};
use crate::synthesize::ExpectedFormat;

/// Replaces the rule-based router's steps (a)–(c). The default-to-hybrid
/// fallback always remains with the deterministic router.
pub trait QuestionClassifier: Send + Sync {
    fn classify(&self, question: &str) -> Result<RouteDecision>;
}

/// Replaces the template-based query builder for attempt 1.
pub trait QueryGenerator: Send + Sync {
    /// `schema_hint` is a short description of the available tables.
    fn generate(&self, constraints: &Constraints, schema_hint: &str) -> Result<SqlAttempt>;
}

/// Replaces the coercion step of synthesis.
pub trait AnswerFormatter: Send + Sync {
    fn format(&self, format: &ExpectedFormat, result: &QueryResult) -> Result<serde_json::Value>;
}

/// The optional collaborators attached to a pipeline. Empty by default.
#[derive(Clone, Default)]
pub struct Plugins {
    pub classifier: Option<Arc<dyn QuestionClassifier>>,
    pub generator: Option<Arc<dyn QueryGenerator>>,
    pub formatter: Option<Arc<dyn AnswerFormatter>>,
}

impl Plugins {
    pub fn none() -> Self {
        Self::default()
    }
}
