//! Scripted in-memory [`Database`] for tests and examples.
//!
//! Responses are queued ahead of time and consumed one per query, which
//! makes repair-loop behavior easy to stage: script two failures and a
//! success to exercise every state transition without a real database.

use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{QueryResult, Row};

use super::Database;

enum Scripted {
    Ok(QueryResult),
    Err(String),
}

/// In-memory store that replays a fixed sequence of responses.
#[derive(Default)]
pub struct MemoryDatabase {
    responses: Mutex<Vec<Scripted>>,
    /// Every query text received, in order.
    queries: Mutex<Vec<String>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn push_result(&self, result: QueryResult) {
        self.responses
            .lock()
            .expect("memory store poisoned")
            .push(Scripted::Ok(result));
    }

    /// Queue a failure with the given backend error message.
    pub fn push_error(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .expect("memory store poisoned")
            .push(Scripted::Err(message.into()));
    }

    /// Queue a one-row, one-column scalar result.
    pub fn push_scalar(&self, column: &str, value: serde_json::Value) {
        let mut row = Row::new();
        row.insert(column.to_string(), value);
        self.push_result(QueryResult {
            columns: vec![column.to_string()],
            rows: vec![row],
        });
    }

    /// Queries received so far, for assertions on repair rewrites.
    pub fn seen_queries(&self) -> Vec<String> {
        self.queries.lock().expect("memory store poisoned").clone()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn run_query(&self, sql: &str) -> Result<QueryResult> {
        self.queries
            .lock()
            .expect("memory store poisoned")
            .push(sql.to_string());

        let next = {
            let mut responses = self.responses.lock().expect("memory store poisoned");
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };

        match next {
            Some(Scripted::Ok(result)) => Ok(result),
            Some(Scripted::Err(message)) => bail!("{message}"),
            None => bail!("no scripted response for query: {sql}"),
        }
    }
}
