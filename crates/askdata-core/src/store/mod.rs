//! Relational store abstraction.
//!
//! The [`Database`] trait is the pipeline's only view of the relational
//! store: a query string goes in, an ordered row set (or an error with a
//! message) comes out. The core treats the store as a black box obeying
//! standard relational semantics; it never writes.
//!
//! Implementations must be `Send + Sync` — a connection pool is shared
//! read-only across concurrently processed questions — and are
//! responsible for enforcing their own per-query timeout, surfacing an
//! expiry as an ordinary error (the executor counts it as one failed
//! attempt).

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::QueryResult;

/// Read-only query access to the relational store.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a query and return its ordered row set.
    ///
    /// An empty row set is a valid, non-error result. The error message
    /// of a failure drives the executor's repair rules, so it should be
    /// passed through from the backend verbatim.
    async fn run_query(&self, sql: &str) -> Result<QueryResult>;
}
