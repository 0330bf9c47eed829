//! Corpus loading.
//!
//! Walks the configured directory for Markdown and plain-text files and
//! builds the in-memory TF-IDF index. Files are visited in a sorted
//! order so chunk identifiers and index contents are reproducible across
//! runs on the same corpus.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use walkdir::WalkDir;

use askdata_core::index::DocumentIndex;
use askdata_core::models::SourceDocument;

const CORPUS_EXTENSIONS: &[&str] = &["md", "txt"];

pub fn load_corpus(dir: &Path) -> Result<Vec<SourceDocument>> {
    if !dir.is_dir() {
        anyhow::bail!("corpus directory not found: {}", dir.display());
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matched = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| CORPUS_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !matched {
            continue;
        }

        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("non-UTF-8 file name: {}", path.display()))?
            .to_string();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
        documents.push(SourceDocument::new(id, text));
    }

    Ok(documents)
}

pub fn build_index(dir: &Path, max_tokens: usize) -> Result<DocumentIndex> {
    let documents = load_corpus(dir)?;
    let index = DocumentIndex::build(&documents, max_tokens);
    info!(
        documents = documents.len(),
        chunks = index.len(),
        "corpus indexed"
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_corpus_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("zebra.md"), "Zebra doc.").unwrap();
        std::fs::write(tmp.path().join("alpha.txt"), "Alpha doc.").unwrap();
        std::fs::write(tmp.path().join("skip.json"), "{}").unwrap();

        let docs = load_corpus(tmp.path()).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zebra"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(load_corpus(&missing).is_err());
    }
}
