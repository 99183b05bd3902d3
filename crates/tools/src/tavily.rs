//! Tavily web search backend.

use async_trait::async_trait;
use fbot_core::error::StoreError;
use fbot_core::knowledge::{SearchBackend, SearchHit};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: TAVILY_URL.to_string(),
        }
    }

    /// Point at a different endpoint (self-hosted proxy, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchBackend for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, StoreError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TavilyRequest {
                api_key: &self.api_key,
                query,
                max_results,
            })
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Tavily request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::QueryFailed(format!("Tavily returned {status}: {body}")));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Invalid Tavily response: {e}")))?;
        debug!(query, results = parsed.results.len(), "Tavily search complete");

        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(TavilyRequest {
            api_key: "k",
            query: "rust",
            max_results: 3,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"api_key": "k", "query": "rust", "max_results": 3}));
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let parsed: TavilyResponse =
            serde_json::from_str(r#"{"results": [{"title": "T", "url": "https://x"}], "answer": null}"#).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert!(parsed.results[0].content.is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let backend = TavilySearch::new("k").with_endpoint("http://127.0.0.1:9/search");
        let err = backend.search("q", 3).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
