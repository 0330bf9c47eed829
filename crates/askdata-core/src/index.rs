//! Term-weighted document index and top-k retriever.
//!
//! Builds a TF-IDF representation of paragraph chunks at construction
//! time and answers cosine-similarity queries against it. Weights are
//! computed once over the full chunk set, so they are stable for the
//! lifetime of an index; the index is immutable and safe to share
//! read-only across concurrent questions.
//!
//! # Scoring
//!
//! 1. Tokenize (lowercase, alphanumeric runs, stop words removed).
//! 2. `idf(t) = 1 + ln((1 + N) / (1 + df(t)))` over the chunk set.
//! 3. Chunk and query vectors are `tf × idf`, L2-normalized, so cosine
//!    similarity reduces to a sparse dot product.
//! 4. Top-k by descending score; ties broken by ascending source id,
//!    then paragraph ordinal; zero-similarity chunks are never returned.
//!
//! Querying an empty index, a query with no vocabulary overlap, or
//! `k = 0` all yield an empty [`RetrievalResult`], never an error.

use std::collections::HashMap;

use crate::chunk::split_paragraphs;
use crate::models::{DocChunk, ResolvedChunk, RetrievalResult, ScoredChunk, SourceDocument};

/// Common English function words excluded from the vocabulary.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "had", "has", "have", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "what",
    "which", "who", "will", "with",
];

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Term counts for one piece of text.
fn term_counts(tokens: &[String]) -> HashMap<&str, f64> {
    let mut counts: HashMap<&str, f64> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

fn l2_normalize(vector: &mut HashMap<String, f64>) {
    let norm: f64 = vector.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for w in vector.values_mut() {
            *w /= norm;
        }
    }
}

/// Immutable TF-IDF index over paragraph chunks.
pub struct DocumentIndex {
    chunks: Vec<DocChunk>,
    /// Chunk position by id, for citation resolution.
    by_id: HashMap<String, usize>,
    /// Inverse document frequency per vocabulary term.
    idf: HashMap<String, f64>,
    /// One L2-normalized sparse weight vector per chunk.
    weights: Vec<HashMap<String, f64>>,
}

impl DocumentIndex {
    /// Chunk the given documents (at most `max_tokens` per chunk) and
    /// compute term weights over the full chunk set. An empty document
    /// collection produces a valid, empty index.
    pub fn build(documents: &[SourceDocument], max_tokens: usize) -> Self {
        let chunks: Vec<DocChunk> = documents
            .iter()
            .flat_map(|d| split_paragraphs(d, max_tokens))
            .collect();

        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.text)).collect();

        let n = chunks.len() as f64;
        let mut df: HashMap<String, f64> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&str> = Vec::new();
            for t in tokens {
                if !seen.contains(&t.as_str()) {
                    seen.push(t);
                    *df.entry(t.clone()).or_insert(0.0) += 1.0;
                }
            }
        }

        let idf: HashMap<String, f64> = df
            .into_iter()
            .map(|(t, d)| (t, 1.0 + ((1.0 + n) / (1.0 + d)).ln()))
            .collect();

        let weights: Vec<HashMap<String, f64>> = tokenized
            .iter()
            .map(|tokens| {
                let mut v: HashMap<String, f64> = term_counts(tokens)
                    .into_iter()
                    .map(|(t, tf)| {
                        let w = tf * idf.get(t).copied().unwrap_or(0.0);
                        (t.to_string(), w)
                    })
                    .collect();
                l2_normalize(&mut v);
                v
            })
            .collect();

        let by_id = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        Self {
            chunks,
            by_id,
            idf,
            weights,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, chunk_id: &str) -> Option<&DocChunk> {
        self.by_id.get(chunk_id).map(|&i| &self.chunks[i])
    }

    /// Top-k chunks by cosine similarity to the question text.
    ///
    /// Terms outside the index vocabulary contribute zero weight. The
    /// result is sorted by descending score, ties broken by ascending
    /// source id then paragraph ordinal.
    ///
    /// The scan is bounded by corpus size and needs no timer; a
    /// store-backed index would enforce a caller-supplied timeout here
    /// and surface expiry as an empty result.
    pub fn query(&self, question: &str, k: usize) -> RetrievalResult {
        if k == 0 || self.chunks.is_empty() {
            return RetrievalResult::default();
        }

        let tokens = tokenize(question);
        let mut query_vec: HashMap<String, f64> = term_counts(&tokens)
            .into_iter()
            .filter_map(|(t, tf)| self.idf.get(t).map(|idf| (t.to_string(), tf * idf)))
            .collect();
        l2_normalize(&mut query_vec);

        if query_vec.is_empty() {
            return RetrievalResult::default();
        }

        let mut scored: Vec<(usize, f64)> = self
            .weights
            .iter()
            .enumerate()
            .filter_map(|(i, w)| {
                let score: f64 = query_vec
                    .iter()
                    .filter_map(|(t, qw)| w.get(t).map(|cw| qw * cw))
                    .sum();
                (score > 0.0).then_some((i, score))
            })
            .collect();

        // Tie-break on (source, ordinal) so "chunk2" ranks before
        // "chunk10" within one document.
        scored.sort_by(|&(a, sa), &(b, sb)| {
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let (ca, cb) = (&self.chunks[a], &self.chunks[b]);
                    ca.source
                        .cmp(&cb.source)
                        .then(ca.ordinal.cmp(&cb.ordinal))
                })
        });
        scored.truncate(k);

        RetrievalResult {
            hits: scored
                .into_iter()
                .map(|(i, score)| ScoredChunk {
                    chunk_id: self.chunks[i].id.clone(),
                    score,
                })
                .collect(),
        }
    }

    /// Attach chunk text to retrieval hits for downstream stages.
    pub fn resolve(&self, result: &RetrievalResult) -> Vec<ResolvedChunk> {
        result
            .hits
            .iter()
            .filter_map(|h| {
                self.get(&h.chunk_id).map(|c| ResolvedChunk {
                    chunk_id: h.chunk_id.clone(),
                    score: h.score,
                    text: c.text.clone(),
                })
            })
            .collect()
    }
}
