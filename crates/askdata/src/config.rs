use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use askdata_core::synthesize::ConfidenceWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub confidence: ConfidenceWeights,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub dir: PathBuf,
    /// Approximate chunk size cap; oversized paragraphs are split.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_max_tokens() -> usize {
    askdata_core::chunk::DEFAULT_MAX_TOKENS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    /// Wall-clock limit per query attempt, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total query attempts per question, repairs included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    askdata_core::executor::MAX_ATTEMPTS
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate corpus
    if config.corpus.max_tokens == 0 {
        anyhow::bail!("corpus.max_tokens must be >= 1");
    }

    // Validate executor
    if config.executor.timeout_ms == 0 {
        anyhow::bail!("executor.timeout_ms must be > 0");
    }
    if !(1..=askdata_core::executor::MAX_ATTEMPTS).contains(&config.executor.max_attempts) {
        anyhow::bail!(
            "executor.max_attempts must be in [1, {}]",
            askdata_core::executor::MAX_ATTEMPTS
        );
    }

    // Validate confidence coefficients
    let w = &config.confidence;
    for (name, value) in [
        ("base", w.base),
        ("execution_bonus", w.execution_bonus),
        ("first_attempt_bonus", w.first_attempt_bonus),
        ("repair_penalty", w.repair_penalty),
        ("retrieval_weight", w.retrieval_weight),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("confidence.{} must be in [0.0, 1.0]", name);
        }
    }

    Ok(config)
}
