//! Knowledge retrieval and web search collaborator traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A ranked text passage from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// Document the passage came from (file name, URL, ...)
    pub source: String,
}

/// Document-similarity lookup over institutional documents.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;

    /// At most `limit` passages, best match first. An empty list means
    /// nothing relevant was found.
    async fn search(&self, query: &str, limit: usize) -> std::result::Result<Vec<Passage>, StoreError>;
}

/// One web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> std::result::Result<Vec<SearchHit>, StoreError>;
}
