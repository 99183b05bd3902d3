//! `retrieve_knowledge`: passage lookup in the institutional knowledge base.

use async_trait::async_trait;
use fbot_core::error::ToolError;
use fbot_core::knowledge::KnowledgeSource;
use fbot_core::tool::{Tool, ToolContext, ToolResult, parse_input};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Returned verbatim when retrieval finds nothing. Handlers key off
/// `ToolResult::data` rather than this text.
pub const NO_KNOWLEDGE: &str = "No relevant information found in the knowledge base.";

pub struct RetrieveKnowledgeTool {
    source: Arc<dyn KnowledgeSource>,
    top_k: usize,
}

impl RetrieveKnowledgeTool {
    pub fn new(source: Arc<dyn KnowledgeSource>) -> Self {
        Self { source, top_k: 3 }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

#[derive(Deserialize)]
struct RetrieveInput {
    query: String,
}

#[async_trait]
impl Tool for RetrieveKnowledgeTool {
    fn name(&self) -> &str {
        "retrieve_knowledge"
    }

    fn description(&self) -> &str {
        "Retrieve relevant passages from the school knowledge base (regulations, tuition, schedules, facilities). \
         Returns each passage with its source document."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query for school information",
                    "minLength": 1
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, arguments: Value) -> Result<ToolResult, ToolError> {
        let input: RetrieveInput = parse_input(self.name(), arguments)?;

        let passages = match self.source.search(&input.query, self.top_k).await {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::failure("knowledge retrieval", e)),
        };
        debug!(query = %input.query, passages = passages.len(), "Knowledge retrieved");

        if passages.is_empty() {
            return Ok(ToolResult::ok(NO_KNOWLEDGE).with_data(json!({ "passages": 0 })));
        }

        let output = passages
            .iter()
            .map(|p| format!("Source: {}\nContent: {}", p.source, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(ToolResult::ok(output).with_data(json!({ "passages": passages.len() })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_core::error::StoreError;
    use fbot_core::knowledge::Passage;
    use fbot_core::thread::ThreadId;

    struct FixedSource(Vec<Passage>);

    #[async_trait]
    impl KnowledgeSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<Passage>, StoreError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl KnowledgeSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Passage>, StoreError> {
            Err(StoreError::Storage("index offline".into()))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(ThreadId::from("t"), "u")
    }

    #[tokio::test]
    async fn formats_passages_with_sources() {
        let tool = RetrieveKnowledgeTool::new(Arc::new(FixedSource(vec![
            Passage { text: "Tuition is 12M VND.".into(), source: "fees.md".into() },
            Passage { text: "Dorm opens at 6am.".into(), source: "dorm.md".into() },
        ])));
        let result = tool.execute(&ctx(), json!({"query": "tuition"})).await.unwrap();
        assert!(result.success);
        assert_eq!(
            result.output,
            "Source: fees.md\nContent: Tuition is 12M VND.\n\nSource: dorm.md\nContent: Dorm opens at 6am."
        );
        assert_eq!(result.data.unwrap()["passages"], 2);
    }

    #[tokio::test]
    async fn empty_retrieval_is_reported() {
        let tool = RetrieveKnowledgeTool::new(Arc::new(FixedSource(vec![])));
        let result = tool.execute(&ctx(), json!({"query": "x"})).await.unwrap();
        assert_eq!(result.output, NO_KNOWLEDGE);
        assert_eq!(result.data.unwrap()["passages"], 0);
    }

    #[tokio::test]
    async fn collaborator_failure_becomes_text() {
        let tool = RetrieveKnowledgeTool::new(Arc::new(BrokenSource));
        let result = tool.execute(&ctx(), json!({"query": "x"})).await.unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Error performing knowledge retrieval:"));
    }
}
