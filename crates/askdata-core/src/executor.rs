//! Query execution with a bounded repair loop.
//!
//! An explicit finite-state machine drives execution: `Run(n)` → on
//! success `Success`; on failure either `Repair(n)` (when attempts
//! remain) or `Failure`. The attempt counter is carried as data, not
//! recursion, so the 3-attempt bound (1 original + 2 repairs) is
//! trivially verifiable.
//!
//! Repair rules rewrite the failed query text deterministically, in a
//! fixed order, keyed off the backend's error message:
//!
//! 1. **Identifier quoting** — bare references to reserved/multi-word
//!    table names (`OrderDetails`, `order_details`, `Order Details`)
//!    become `"Order Details"`.
//! 2. **Column disambiguation** — ambiguous column references are
//!    qualified with their source table's alias.
//! 3. **Syntax cleanup** — terminal semicolon, `DATE(expr)` unwrapped.
//!
//! Every rule is idempotent (reapplying it to an already-correct query
//! changes nothing), so the loop cannot oscillate; when no rule applies
//! the rewritten text is identical and the attempt bound still
//! terminates the loop.

use crate::error::PipelineError;
use crate::models::{QueryResult, SqlAttempt};
use crate::store::Database;

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum total attempts: the original plus two repairs.
pub const MAX_ATTEMPTS: u32 = 3;

/// Table names that must be double-quoted, with the bare spellings a
/// generator might emit for them.
const RESERVED_TABLES: &[(&str, &[&str])] =
    &[("Order Details", &["OrderDetails", "order_details"])];

/// Ambiguous columns and the alias of their canonical source table.
const AMBIGUOUS_COLUMNS: &[(&str, &str)] = &[
    ("OrderID", "o"),
    ("ProductID", "p"),
    ("CustomerID", "o"),
    ("CategoryID", "p"),
];

static DATE_CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"DATE\(([^)]+)\)").expect("date-call regex"));

/// Rule 1: quote reserved table names. Already-quoted occurrences are
/// protected with a placeholder so reapplication is a no-op.
fn quote_reserved_tables(sql: &str) -> String {
    let mut out = sql.to_string();
    for (table, bare_forms) in RESERVED_TABLES {
        let quoted = format!("\"{table}\"");
        for bare in *bare_forms {
            out = out.replace(bare, &quoted);
        }
        let placeholder = "\u{1}";
        out = out.replace(&quoted, placeholder);
        out = out.replace(table, &quoted);
        out = out.replace(placeholder, &quoted);
    }
    out
}

/// Rule 2: prefix bare occurrences of `column` with `alias.`.
///
/// An occurrence is bare when it is a whole identifier (no surrounding
/// word characters) and not already qualified or quoted.
fn qualify_column(sql: &str, column: &str, alias: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut rest = sql;
    while let Some(pos) = rest.find(column) {
        let (before, tail) = rest.split_at(pos);
        let after = &tail[column.len()..];

        let prev = before.chars().last();
        let next = after.chars().next();
        let bounded_left = !matches!(prev, Some(c) if c.is_alphanumeric() || c == '_' || c == '.' || c == '"');
        let bounded_right = !matches!(next, Some(c) if c.is_alphanumeric() || c == '_');

        out.push_str(before);
        if bounded_left && bounded_right {
            out.push_str(alias);
            out.push('.');
        }
        out.push_str(column);
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Rule 3: terminal semicolon and `DATE(expr)` → `expr`.
fn syntax_cleanup(sql: &str) -> String {
    let mut out = DATE_CALL_RE.replace_all(sql, "$1").into_owned();
    out = out.trim().to_string();
    if !out.ends_with(';') {
        out.push(';');
    }
    out
}

/// Rewrite a failed query according to its error message. Rules are
/// applied in fixed order; an error no rule recognizes leaves the text
/// unchanged.
pub fn repair(sql: &str, error: &str) -> String {
    let e = error.to_lowercase();
    let mut out = sql.to_string();

    if e.contains("no such table") || e.contains("no such column") || e.contains("syntax error") {
        out = quote_reserved_tables(&out);
    }
    if e.contains("ambiguous column") {
        for (column, alias) in AMBIGUOUS_COLUMNS {
            out = qualify_column(&out, column, alias);
        }
    }
    if e.contains("syntax error") {
        out = syntax_cleanup(&out);
    }

    out
}

/// Everything the executor produced: the full attempt history and, on
/// success, the row set.
#[derive(Debug)]
pub struct Execution {
    pub attempts: Vec<SqlAttempt>,
    pub result: Option<QueryResult>,
}

impl Execution {
    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }

    pub fn succeeded_first_try(&self) -> bool {
        self.result.is_some() && self.attempts.len() == 1
    }

    /// Repairs consumed: attempts beyond the first.
    pub fn repairs_used(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.attempts.last().and_then(|a| a.error.as_deref())
    }

    /// The terminal-failure error, carrying the full attempt history.
    pub fn failure(&self) -> Option<PipelineError> {
        if self.succeeded() {
            return None;
        }
        Some(PipelineError::QueryExecution {
            message: self.last_error().unwrap_or("unknown").to_string(),
            history: self.attempts.clone(),
        })
    }
}

enum State {
    Run(SqlAttempt),
    Repair { failed_sql: String, error: String, next_attempt: u32 },
    Success(QueryResult),
    Failure,
}

/// Run a query against the store, repairing and retrying on failure up
/// to `max_attempts` total attempts (at most [`MAX_ATTEMPTS`]). Never
/// returns an `Err` — a terminal failure is reported through
/// [`Execution::failure`] so the synthesizer always runs.
pub async fn execute(db: &dyn Database, first: SqlAttempt, max_attempts: u32) -> Execution {
    let mut attempts: Vec<SqlAttempt> = Vec::new();
    let mut state = State::Run(first);

    loop {
        state = match state {
            State::Run(mut attempt) => match db.run_query(&attempt.sql).await {
                Ok(result) => {
                    attempts.push(attempt);
                    State::Success(result)
                }
                Err(err) => {
                    let message = err.to_string();
                    tracing::debug!(attempt = attempt.attempt, error = %message, "query attempt failed");
                    attempt.error = Some(message.clone());
                    let n = attempt.attempt;
                    let failed_sql = attempt.sql.clone();
                    attempts.push(attempt);
                    if n < max_attempts {
                        State::Repair {
                            failed_sql,
                            error: message,
                            next_attempt: n + 1,
                        }
                    } else {
                        State::Failure
                    }
                }
            },
            State::Repair {
                failed_sql,
                error,
                next_attempt,
            } => State::Run(SqlAttempt {
                sql: repair(&failed_sql, &error),
                attempt: next_attempt,
                error: None,
            }),
            State::Success(result) => {
                return Execution {
                    attempts,
                    result: Some(result),
                }
            }
            State::Failure => {
                return Execution {
                    attempts,
                    result: None,
                }
            }
        };
    }
}
