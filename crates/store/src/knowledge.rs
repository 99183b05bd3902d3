//! Keyword-ranked knowledge base over a directory of text documents.

use async_trait::async_trait;
use fbot_core::error::StoreError;
use fbot_core::knowledge::{KnowledgeSource, Passage};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// A document chunk with its pre-tokenized terms.
#[derive(Debug, Clone)]
struct Chunk {
    text: String,
    source: String,
    terms: Vec<String>,
}

/// Knowledge base loaded from `.txt` and `.md` files.
///
/// Documents are split into overlapping character windows; a query is
/// scored against each chunk by how many distinct query terms it contains,
/// then by total term hits.
#[derive(Debug, Default)]
pub struct KeywordKnowledgeBase {
    chunks: Vec<Chunk>,
}

impl KeywordKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.txt`/`.md` file directly under `dir`.
    pub async fn load_dir(dir: &Path, chunk_size: usize, overlap: usize) -> Result<Self, StoreError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to read {}: {e}", dir.display())))?;

        let mut kb = Self::new();
        let mut files = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to list {}: {e}", dir.display())))?
        {
            let path = entry.path();
            let is_doc = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"));
            if !is_doc {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    let source = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    kb.add_document(&source, &text, chunk_size, overlap);
                    files += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
            }
        }

        info!(dir = %dir.display(), files, chunks = kb.chunks.len(), "Knowledge base loaded");
        Ok(kb)
    }

    /// Chunk and index one document.
    pub fn add_document(&mut self, source: &str, text: &str, chunk_size: usize, overlap: usize) {
        for piece in split_chunks(text, chunk_size, overlap) {
            let terms = tokenize(&piece);
            if terms.is_empty() {
                continue;
            }
            self.chunks.push(Chunk {
                text: piece,
                source: source.to_string(),
                terms,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl KnowledgeSource for KeywordKnowledgeBase {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Passage>, StoreError> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        if query_terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, usize, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(i, chunk)| {
                let hits = chunk.terms.iter().filter(|t| query_terms.contains(*t)).count();
                let distinct = query_terms.iter().filter(|q| chunk.terms.contains(*q)).count();
                (distinct > 0).then_some((distinct, hits, i))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, _, i)| Passage {
                text: self.chunks[i].text.clone(),
                source: self.chunks[i].source.clone(),
            })
            .collect())
    }
}

/// Lowercased alphanumeric words of at least two characters.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Overlapping character windows. A window ends on whitespace when one is
/// available in its second half.
fn split_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            let half = start + chunk_size / 2;
            if let Some(ws) = (half..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}
