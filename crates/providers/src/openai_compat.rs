//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions`. Supports non-streaming and SSE streaming completions
//! with function calling.

use async_trait::async_trait;
use futures::StreamExt;
use fbot_core::error::ProviderError;
use fbot_core::message::{Message, MessageToolCall, Role};
use fbot_core::provider::{ChunkReceiver, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(to_api_tools(&request.tools));
        }
        body
    }

    async fn post(&self, body: &serde_json::Value, sse: bool) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body);
        if sse {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        match response.status().as_u16() {
            200 => Ok(response),
            429 => Err(ProviderError::RateLimited { retry_after_secs: 5 }),
            401 | 403 => Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            )),
            status => {
                let message = response.text().await.unwrap_or_default();
                warn!(provider = %self.name, status, body = %message, "Provider returned error");
                Err(ProviderError::ApiError { status_code: status, message })
            }
        }
    }
}

#[async_trait]
impl fbot_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");
        let response = self.post(&Self::request_body(&request, false), false).await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ProviderResponse {
            message: Message::assistant_tool_calls(choice.message.content.unwrap_or_default(), tool_calls),
            usage: api_response.usage.map(Usage::from),
            model: api_response.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");
        let response = self.post(&Self::request_body(&request, true), true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut parser = SseParser::default();

            while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                };
                for event in parser.feed(&chunk) {
                    let done = event.done;
                    if tx.send(Ok(event)).await.is_err() {
                        trace!(provider = %provider_name, "Stream receiver dropped");
                        return;
                    }
                    if done {
                        return;
                    }
                }
            }

            // Connection closed without [DONE]
            let _ = tx.send(Ok(parser.finish(None))).await;
        });

        Ok(rx)
    }
}

fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
                Role::Tool => "tool",
            }
            .to_string(),
            content: Some(m.content.clone()),
            tool_calls: (!m.tool_calls.is_empty()).then(|| {
                m.tool_calls
                    .iter()
                    .map(|tc| ApiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
    tools
        .iter()
        .map(|t| ApiToolDefinition {
            r#type: "function".into(),
            function: ApiToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

// ── SSE parsing ──

/// Incremental parser for `data: {...}` lines.
///
/// Bytes are buffered until a full line arrives, so a multibyte character
/// split across network chunks is decoded whole. Content deltas are emitted
/// as they arrive. Tool call fragments are accumulated by index and released
/// with the final chunk.
#[derive(Default)]
struct SseParser {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, MessageToolCall>,
    finished: bool,
}

impl SseParser {
    fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if self.finished {
                continue;
            }
            let Ok(line) = std::str::from_utf8(&raw) else {
                warn!(len = raw.len(), "Ignoring SSE line with invalid UTF-8");
                continue;
            };
            let line = line.trim_end_matches(['\n', '\r']);
            let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                continue;
            };
            if data == "[DONE]" {
                out.push(self.finish(None));
                continue;
            }
            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => self.absorb(resp, &mut out),
                Err(e) => trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk"),
            }
        }
        out
    }

    fn absorb(&mut self, resp: StreamResponse, out: &mut Vec<StreamChunk>) {
        if let Some(choice) = resp.choices.into_iter().next() {
            for delta in choice.delta.tool_calls.unwrap_or_default() {
                let acc = self.tool_calls.entry(delta.index).or_insert_with(|| MessageToolCall {
                    id: String::new(),
                    name: String::new(),
                    arguments: String::new(),
                });
                if let Some(id) = delta.id {
                    acc.id = id;
                }
                if let Some(func) = delta.function {
                    if let Some(name) = func.name {
                        acc.name = name;
                    }
                    if let Some(args) = func.arguments {
                        acc.arguments.push_str(&args);
                    }
                }
            }
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                out.push(StreamChunk {
                    content: Some(content),
                    ..Default::default()
                });
            }
        }
        // With include_usage the usage record is the last payload before [DONE]
        if let Some(usage) = resp.usage {
            out.push(self.finish(Some(usage.into())));
        }
    }

    fn finish(&mut self, usage: Option<Usage>) -> StreamChunk {
        self.finished = true;
        StreamChunk {
            content: None,
            tool_calls: std::mem::take(&mut self.tool_calls).into_values().collect(),
            done: true,
            usage,
        }
    }
}

// ── OpenAI API types (internal) ──

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_core::Provider;

    #[test]
    fn new_normalizes_base_url() {
        let provider = OpenAiCompatProvider::new("custom", "http://localhost:9000/v1/", "k");
        assert_eq!(provider.base_url(), "http://localhost:9000/v1");
    }

    #[test]
    fn request_body_includes_tools_only_when_present() {
        let plain = ProviderRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
        let body = OpenAiCompatProvider::request_body(&plain, false);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], false);

        let with_tools = plain.with_tools(vec![ToolDefinition {
            name: "list_tasks".into(),
            description: "List tasks".into(),
            parameters: serde_json::json!({"type": "object"}),
        }]);
        let body = OpenAiCompatProvider::request_body(&with_tools, true);
        assert_eq!(body["tools"][0]["function"]["name"], "list_tasks");
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn message_conversion_keeps_tool_linkage() {
        let call = MessageToolCall {
            id: "call_1".into(),
            name: "retrieve_knowledge".into(),
            arguments: r#"{"query":"học phí"}"#.into(),
        };
        let msgs = vec![
            Message::system("rules"),
            Message::assistant_tool_calls("", vec![call]),
            Message::tool_result("call_1", "No relevant information found in the knowledge base."),
        ];
        let api = to_api_messages(&msgs);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].tool_calls.as_ref().unwrap()[0].function.name, "retrieve_knowledge");
        assert_eq!(api[2].role, "tool");
        assert_eq!(api[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn sse_parser_emits_content_deltas() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Xin \"}}]}\n\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"chào\"}}]}\n\n"
                .as_bytes(),
        );
        let text: Vec<_> = chunks.iter().filter_map(|c| c.content.as_deref()).collect();
        assert_eq!(text, vec!["Xin ", "chào"]);
        assert!(chunks.iter().all(|c| !c.done));
    }

    #[test]
    fn sse_parser_handles_split_lines() {
        let mut parser = SseParser::default();
        assert!(parser.feed(b"data: {\"choices\":[{\"delta\":{\"con").is_empty());
        let chunks = parser.feed(b"tent\":\"ok\"}}]}\n");
        assert_eq!(chunks[0].content.as_deref(), Some("ok"));
    }

    #[test]
    fn sse_parser_assembles_tool_calls_in_index_order() {
        let mut parser = SseParser::default();
        let mut chunks = parser.feed(concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"call_b\",\"function\":{\"name\":\"list_tasks\",\"arguments\":\"{}\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"create_task\",\"arguments\":\"{\\\"title\\\"\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\":\\\"X\\\"}\"}}]}}]}\n",
            "data: [DONE]\n",
        ).as_bytes());
        let last = chunks.pop().unwrap();
        assert!(last.done);
        assert_eq!(last.tool_calls.len(), 2);
        assert_eq!(last.tool_calls[0].name, "create_task");
        assert_eq!(last.tool_calls[0].arguments, r#"{"title":"X"}"#);
        assert_eq!(last.tool_calls[1].id, "call_b");
    }

    #[test]
    fn sse_parser_finishes_on_usage_and_ignores_rest() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(concat!(
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n",
            "data: [DONE]\n",
            ": keep-alive\n",
        ).as_bytes());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].done);
        assert_eq!(chunks[0].usage.as_ref().unwrap().total_tokens, 15);
    }

    #[test]
    fn sse_parser_keeps_multibyte_char_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Học phí\"}}]}\n".as_bytes();
        // Cut inside the three-byte 'ọ'.
        let split = line.windows(3).position(|w| w == "ọ".as_bytes()).unwrap() + 1;

        let mut parser = SseParser::default();
        assert!(parser.feed(&line[..split]).is_empty());
        let chunks = parser.feed(&line[split..]);
        assert_eq!(chunks[0].content.as_deref(), Some("Học phí"));
    }

    #[tokio::test]
    async fn stream_decodes_text_split_across_http_chunks() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Học phí\"}}]}\n\ndata: [DONE]\n\n".as_bytes();
            let split = body.windows(3).position(|w| w == "ọ".as_bytes()).unwrap() + 1;

            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n")
                .await
                .unwrap();
            for part in [&body[..split], &body[split..]] {
                socket.write_all(format!("{:x}\r\n", part.len()).as_bytes()).await.unwrap();
                socket.write_all(part).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
        });

        let provider = OpenAiCompatProvider::new("local", format!("http://{addr}/v1"), "k");
        let mut rx = provider
            .stream(ProviderRequest::new("gpt-4o-mini", vec![Message::user("học phí?")]))
            .await
            .unwrap();

        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            if let Some(content) = chunk.content {
                text.push_str(&content);
            }
            if chunk.done {
                break;
            }
        }
        assert_eq!(text, "Học phí");
    }

    #[test]
    fn sse_parser_skips_garbage() {
        let mut parser = SseParser::default();
        assert!(parser.feed(b"data: not-json\nevent: ping\n").is_empty());
    }
}
