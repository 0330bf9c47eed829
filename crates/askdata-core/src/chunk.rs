//! Paragraph-boundary chunker.
//!
//! Splits a source document into [`DocChunk`]s on blank-line boundaries
//! (`\n\n`), respecting a configurable `max_tokens` limit. Paragraphs
//! are the atomic retrievable unit; chunk ids take the form
//! `"{source}::chunk{ordinal}"` so a citation is traceable back to a
//! position in its source document.
//!
//! `max_tokens` converts to a character budget via a 4 chars/token
//! ratio. A paragraph over the budget is hard-split at the nearest
//! newline or space boundary; each piece becomes its own chunk with the
//! next ordinal.
//!
//! Empty and whitespace-only paragraphs are skipped; a document with no
//! non-empty paragraph yields no chunks (an empty corpus is handled by
//! the index, not here).

use crate::models::{DocChunk, SourceDocument};

/// Approximate characters-per-token ratio used to convert `max_tokens`
/// into a character budget.
const CHARS_PER_TOKEN: usize = 4;

/// Default per-chunk token limit when no configuration supplies one.
pub const DEFAULT_MAX_TOKENS: usize = 700;

/// Snap a byte offset down to the nearest UTF-8 character boundary.
fn snap_to_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Split an oversized paragraph into pieces of at most `max_chars`
/// bytes, preferring newline and space boundaries. Always makes
/// progress, so the loop terminates even for pathological budgets.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut remaining = text;
    while remaining.len() > max_chars {
        let limit = snap_to_char_boundary(remaining, max_chars);
        let mut split = remaining[..limit]
            .rfind('\n')
            .or_else(|| remaining[..limit].rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(limit);
        if split == 0 {
            // No boundary and the budget is below one character; take
            // exactly one character so the loop advances.
            split = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
        }
        pieces.push(remaining[..split].trim_end().to_string());
        remaining = remaining[split..].trim_start();
    }
    if !remaining.is_empty() {
        pieces.push(remaining.to_string());
    }
    pieces
}

/// Split a document's text into paragraph chunks with contiguous
/// ordinals, each at most `max_tokens × 4` characters.
pub fn split_paragraphs(doc: &SourceDocument, max_tokens: usize) -> Vec<DocChunk> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    for para in doc.text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        for piece in hard_split(trimmed, max_chars) {
            let i = chunks.len();
            chunks.push(DocChunk {
                id: format!("{}::chunk{}", doc.id, i),
                source: doc.id.clone(),
                ordinal: i,
                text: piece,
            });
        }
    }
    chunks
}
