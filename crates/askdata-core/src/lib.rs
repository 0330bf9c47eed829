//! Core decision pipeline for answering analytics questions over a
//! document corpus and a relational store.
//!
//! Everything in this crate is deterministic: the same question against
//! the same corpus and data always routes, retrieves, plans, queries,
//! and scores identically. The crate is runtime-free — the [`store::Database`]
//! trait is async, but no executor or database driver lives here.
//! Binaries supply both, plus any pluggable [`plugins`] stages.
//!
//! Stage order for one question:
//!
//! 1. [`router`] — pick docs-only, data-only, or hybrid
//! 2. [`index`] — TF-IDF retrieval over paragraph chunks ([`chunk`])
//! 3. [`planner`] — distill question and chunks into constraints
//! 4. [`sqlgen`] — render constraints into one SQL query
//! 5. [`executor`] — run it, repairing up to a fixed attempt cap
//! 6. [`synthesize`] — coerce, cite, and score the final answer
//!
//! [`pipeline::Pipeline`] wires the stages together and records a
//! [`trace::Trace`] of each run.

pub mod chunk;
pub mod error;
pub mod executor;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod plugins;
pub mod router;
pub mod sqlgen;
pub mod store;
pub mod synthesize;
pub mod trace;
