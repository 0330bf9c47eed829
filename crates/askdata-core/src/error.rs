//! Error taxonomy for the pipeline.
//!
//! Only [`PipelineError::InvalidQuestion`] aborts a run. Everything else
//! degrades: an insufficient-constraints signal skips the executor, a
//! terminal query failure still reaches the synthesizer, and an empty
//! retrieval is not an error at all.

use thiserror::Error;

use crate::models::SqlAttempt;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The question text was empty or whitespace. Fails fast.
    #[error("invalid question: text is empty")]
    InvalidQuestion,

    /// The query builder declined to render a query. The executor branch
    /// is skipped and the synthesizer degrades gracefully.
    #[error("constraints insufficient to build a query: {0}")]
    ConstraintsInsufficient(String),

    /// The repair budget is exhausted. Carries the last error message and
    /// the full attempt history; the synthesizer still runs.
    #[error("query failed after {} attempts: {message}", history.len())]
    QueryExecution {
        message: String,
        history: Vec<SqlAttempt>,
    },
}
