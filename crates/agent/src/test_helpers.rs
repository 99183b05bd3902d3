//! Scripted providers shared by the agent tests.

use async_trait::async_trait;
use fbot_core::error::ProviderError;
use fbot_core::message::{Message, MessageToolCall};
use fbot_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Returns scripted responses in order and records every request.
///
/// With `chunked`, `stream` splits text into one chunk per word so
/// incremental delivery can be observed.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    chunked: bool,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            requests: Mutex::new(Vec::new()),
            chunked: false,
            delay: None,
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(text(t))).collect())
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("ScriptedProvider: no response left for call #{}", self.call_count()))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next(request)
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = mpsc::channel(64);
        let pieces: Vec<String> = if self.chunked {
            response
                .message
                .content
                .split_inclusive(' ')
                .map(str::to_string)
                .collect()
        } else {
            vec![response.message.content.clone()]
        };
        for piece in pieces {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(piece),
                    ..Default::default()
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                tool_calls: response.message.tool_calls,
                done: true,
                usage: response.usage,
                ..Default::default()
            }))
            .await;
        Ok(rx)
    }
}

pub fn text(content: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(content),
        usage: None,
        model: "mock-model".into(),
    }
}

pub fn tool_calls(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls("", calls),
        usage: None,
        model: "mock-model".into(),
    }
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}
