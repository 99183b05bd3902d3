//! `web_search`: current information from the web, with source URLs.

use async_trait::async_trait;
use fbot_core::error::{StoreError, ToolError};
use fbot_core::knowledge::{SearchBackend, SearchHit};
use fbot_core::tool::{Tool, ToolContext, ToolResult, parse_input};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

const SNIPPET_CHARS: usize = 300;

/// Web search over an optional backend. Without one, every call reports
/// that search is not configured.
pub struct WebSearchTool {
    backend: Option<Arc<dyn SearchBackend>>,
    default_max_results: usize,
}

impl WebSearchTool {
    pub fn new(backend: Option<Arc<dyn SearchBackend>>) -> Self {
        Self {
            backend,
            default_max_results: 3,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.default_max_results = max_results.clamp(1, 10);
        self
    }
}

#[derive(Deserialize)]
struct SearchInput {
    query: String,
    max_results: Option<u64>,
}

/// Numbered results with title, URL and a truncated snippet.
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let snippet: String = hit.content.chars().take(SNIPPET_CHARS).collect();
            format!(
                "Result {}:\nTitle: {}\nURL: {}\nContent: {snippet}...",
                i + 1,
                if hit.title.is_empty() { "N/A" } else { &hit.title },
                if hit.url.is_empty() { "N/A" } else { &hit.url },
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Cite the title and URL of every result you use."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query", "minLength": 1 },
                "max_results": { "type": "integer", "description": "Maximum number of results (default 3)" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, arguments: Value) -> Result<ToolResult, ToolError> {
        let input: SearchInput = parse_input(self.name(), arguments)?;
        let Some(backend) = &self.backend else {
            return Ok(ToolResult::failure("web search", "search is not configured (no search API key is set)"));
        };

        let max_results = input
            .max_results
            .map(|n| (n as usize).clamp(1, 10))
            .unwrap_or(self.default_max_results);

        match backend.search(&input.query, max_results).await {
            Ok(hits) if hits.is_empty() => Ok(ToolResult::ok("No search results found.")),
            Ok(hits) => {
                let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
                Ok(ToolResult::ok(format_hits(&hits)).with_data(json!({ "urls": urls })))
            }
            Err(e) => Ok(ToolResult::failure("web search", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_core::thread::ThreadId;
    use std::sync::Mutex;

    struct StubBackend {
        hits: Vec<SearchHit>,
        requested: Mutex<Option<usize>>,
    }

    #[async_trait]
    impl SearchBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }
        async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, StoreError> {
            *self.requested.lock().unwrap() = Some(max_results);
            Ok(self.hits.iter().take(max_results).cloned().collect())
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(ThreadId::from("t"), "u")
    }

    #[tokio::test]
    async fn formats_results_with_urls() {
        let backend = Arc::new(StubBackend {
            hits: vec![SearchHit {
                title: "OpenAI".into(),
                url: "https://openai.com".into(),
                content: "x".repeat(400),
            }],
            requested: Mutex::new(None),
        });
        let tool = WebSearchTool::new(Some(backend.clone()));
        let result = tool.execute(&ctx(), json!({"query": "openai"})).await.unwrap();

        assert!(result.output.starts_with("Result 1:\nTitle: OpenAI\nURL: https://openai.com\nContent: "));
        assert!(result.output.ends_with(&format!("{}...", "x".repeat(300))));
        assert_eq!(*backend.requested.lock().unwrap(), Some(3));
    }

    #[tokio::test]
    async fn empty_and_unconfigured() {
        let tool = WebSearchTool::new(Some(Arc::new(StubBackend {
            hits: vec![],
            requested: Mutex::new(None),
        })));
        let result = tool.execute(&ctx(), json!({"query": "nothing", "max_results": 50})).await.unwrap();
        assert_eq!(result.output, "No search results found.");

        let tool = WebSearchTool::new(None);
        let result = tool.execute(&ctx(), json!({"query": "x"})).await.unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Error performing web search:"));
        assert!(result.output.contains("not configured"));
    }
}
