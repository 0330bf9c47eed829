//! # AskData
//!
//! **Deterministic hybrid question answering over documents and SQL.**
//!
//! AskData answers natural-language analytics questions against two
//! evidence sources at once: a directory of Markdown/text documents
//! (policies, campaign calendars) and a SQLite analytics database. Every
//! stage is rule-driven, so the same question against the same data
//! always produces the same answer, citations, and confidence.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │  Corpus  │──▶│  TF-IDF   │──▶│              │
//! │ (md/txt) │   │   index   │   │   Pipeline   │──▶ Answer + trace
//! └──────────┘   └───────────┘   │ route/plan/  │
//! ┌──────────┐   ┌───────────┐   │ query/repair │
//! │  SQLite  │──▶│ Database  │──▶│ /synthesize  │
//! │ (sales)  │   │   trait   │   └──────────────┘
//! └──────────┘   └───────────┘
//! ```
//!
//! The decision pipeline itself lives in `askdata-core`; this crate
//! supplies the configuration layer ([`config`]), the SQLite driver
//! ([`sqlite_db`]), corpus loading ([`corpus`]), and the CLI commands
//! ([`run`]).

pub mod config;
pub mod corpus;
pub mod db;
pub mod run;
pub mod sqlite_db;
