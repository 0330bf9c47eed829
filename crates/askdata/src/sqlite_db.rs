//! SQLite-backed [`Database`] implementation.
//!
//! Wraps a [`SqlitePool`] and decodes every result cell into JSON so the
//! core pipeline stays driver-agnostic. A per-query wall-clock timeout is
//! enforced here; a timed-out attempt surfaces as an ordinary execution
//! error and feeds the repair loop like any other failure.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, SqlitePool};

use askdata_core::models::{QueryResult, Row};
use askdata_core::store::Database;

pub struct SqliteDatabase {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteDatabase {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// User tables in the attached database, for the `tables` command.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// SQLite stores dynamically typed cells; probe integer, then real, then
/// text. NULL decodes as `None` on every path.
fn decode_cell(row: &SqliteRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(|f| json!(f)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn run_query(&self, sql: &str) -> Result<QueryResult> {
        let fetch = sqlx::query(sql).fetch_all(&self.pool);
        let raw = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("query timed out after {}ms", self.timeout.as_millis()),
        };

        let columns: Vec<String> = raw
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = raw
            .iter()
            .map(|row| {
                let mut out = Row::new();
                for (idx, column) in row.columns().iter().enumerate() {
                    out.insert(column.name().to_string(), decode_cell(row, idx));
                }
                out
            })
            .collect();

        Ok(QueryResult { columns, rows })
    }
}
