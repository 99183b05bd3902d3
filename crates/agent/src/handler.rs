//! Handlers: bounded tool-using reasoning loops.
//!
//! A handler receives the thread's history, may call tools from its own
//! registry for up to `max_rounds` rounds, and produces one final answer.
//! Text is streamed to the caller as [`TurnEvent::Message`] events carrying
//! everything generated so far in the turn, across tool rounds. A handler
//! never mutates the thread.

use chrono::Utc;
use fbot_core::error::ProviderError;
use fbot_core::event::{DomainEvent, EventBus};
use fbot_core::message::{Message, MessageToolCall};
use fbot_core::provider::{Provider, ProviderRequest};
use fbot_core::route::RouteDecision;
use fbot_core::thread::ConversationThread;
use fbot_core::tool::{ToolCall, ToolContext, ToolRegistry};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::prompts::{self, FORCE_ANSWER_NOTE, KNOWLEDGE_DECLINE, render};
use crate::stream_event::TurnEvent;

/// Default bound on tool rounds per invocation.
pub const DEFAULT_MAX_ROUNDS: u32 = 8;

/// Generation settings shared by every handler.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_rounds: u32,
}

impl HandlerSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

/// Retrieval outcomes seen during one invocation.
#[derive(Debug, Default)]
struct RetrievalTally {
    calls: usize,
    passages: u64,
}

impl RetrievalTally {
    /// Retrieval ran and every call came back empty.
    fn came_up_empty(&self) -> bool {
        self.calls > 0 && self.passages == 0
    }
}

pub struct Handler {
    kind: RouteDecision,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    settings: HandlerSettings,
    event_bus: Option<Arc<EventBus>>,
}

impl Handler {
    pub fn new(kind: RouteDecision, provider: Arc<dyn Provider>, tools: ToolRegistry, settings: HandlerSettings) -> Self {
        Self {
            kind,
            provider,
            tools,
            settings,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn kind(&self) -> RouteDecision {
        self.kind
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    /// System prompt for this handler's behavior profile.
    fn system_prompt(&self, ctx: &ToolContext) -> String {
        let now = ctx.now.format("%Y-%m-%d %H:%M (%A)").to_string();
        let vars = [("now", now.as_str()), ("user_id", ctx.user_id.as_str())];
        let template = match self.kind {
            RouteDecision::Knowledge => prompts::KNOWLEDGE_PROMPT,
            RouteDecision::Task => prompts::TASK_PROMPT,
            RouteDecision::Analytics => prompts::ANALYTICS_PROMPT,
            RouteDecision::General => prompts::GENERAL_PROMPT,
        };
        render(template, &vars)
    }

    fn request(&self, messages: Vec<Message>, with_tools: bool) -> ProviderRequest {
        let mut request = ProviderRequest::new(&self.settings.model, messages).with_temperature(self.settings.temperature);
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if with_tools && !self.tools.is_empty() {
            request = request.with_tools(self.tools.definitions());
        }
        request.stream = true;
        request
    }

    /// Run the reasoning loop and return the final answer.
    ///
    /// Partial text goes to `sink`; a closed sink does not stop the loop.
    pub async fn run(
        &self,
        thread: &ConversationThread,
        ctx: &ToolContext,
        sink: &mpsc::Sender<TurnEvent>,
    ) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(thread.len() + 1);
        messages.push(Message::system(self.system_prompt(ctx)));
        messages.extend(thread.turns().iter().map(|t| t.to_message()));

        let mut retrieval = RetrievalTally::default();
        let mut streamed = String::new();

        for round in 1..=self.settings.max_rounds {
            debug!(thread_id = %ctx.thread_id, handler = %self.kind, round, "Handler round");

            let (text, calls) = self
                .stream_round(self.request(messages.clone(), true), sink, &mut streamed)
                .await?;
            if calls.is_empty() {
                return Ok(text);
            }

            messages.push(Message::assistant_tool_calls(text, calls.clone()));
            for call in &calls {
                let output = self.execute_tool(call, ctx, &mut retrieval).await;
                messages.push(Message::tool_result(&call.id, output));
            }

            if self.kind == RouteDecision::Knowledge && retrieval.came_up_empty() {
                info!(thread_id = %ctx.thread_id, "Retrieval found nothing, declining");
                append_round(&mut streamed, KNOWLEDGE_DECLINE);
                let _ = sink.send(TurnEvent::Message { content: streamed }).await;
                return Ok(KNOWLEDGE_DECLINE.to_string());
            }
        }

        warn!(
            thread_id = %ctx.thread_id,
            handler = %self.kind,
            max_rounds = self.settings.max_rounds,
            "Tool round limit reached, forcing final answer"
        );
        messages.push(Message::system(FORCE_ANSWER_NOTE));
        let (text, _) = self.stream_round(self.request(messages, false), sink, &mut streamed).await?;
        Ok(text)
    }

    /// One streamed generation. Returns the round's own text and any tool
    /// calls; `streamed` accumulates the text of every round in the turn.
    async fn stream_round(
        &self,
        request: ProviderRequest,
        sink: &mpsc::Sender<TurnEvent>,
        streamed: &mut String,
    ) -> Result<(String, Vec<MessageToolCall>), ProviderError> {
        let mut rx = self.provider.stream(request).await?;
        let mut text = String::new();
        let mut calls = Vec::new();

        while let Some(item) = rx.recv().await {
            let chunk = item?;
            if let Some(delta) = chunk.content.filter(|d| !d.is_empty()) {
                if text.is_empty() {
                    append_round(streamed, "");
                }
                text.push_str(&delta);
                streamed.push_str(&delta);
                let _ = sink.send(TurnEvent::Message { content: streamed.clone() }).await;
            }
            calls.extend(chunk.tool_calls);
            if chunk.done {
                break;
            }
        }
        Ok((text, calls))
    }

    /// Execute one call. Every outcome, including invalid input and unknown
    /// tools, becomes text for the model.
    async fn execute_tool(&self, call: &MessageToolCall, ctx: &ToolContext, retrieval: &mut RetrievalTally) -> String {
        let arguments = match serde_json::from_str(&call.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool arguments are not valid JSON");
                return format!("Error: arguments for {} are not valid JSON: {e}", call.name);
            }
        };
        let tool_call = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        };

        let start = Instant::now();
        let result = self.tools.execute(&tool_call, ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, output) = match result {
            Ok(result) => {
                if call.name == "retrieve_knowledge" {
                    retrieval.calls += 1;
                    retrieval.passages += result
                        .data
                        .as_ref()
                        .and_then(|d| d.get("passages"))
                        .and_then(|p| p.as_u64())
                        .unwrap_or(0);
                }
                (result.success, result.output)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call rejected");
                (false, format!("Error: {e}"))
            }
        };

        debug!(tool = %call.name, success, duration_ms, "Tool executed");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                thread_id: ctx.thread_id.to_string(),
                tool_name: call.name.clone(),
                success,
                duration_ms,
                timestamp: Utc::now(),
            });
        }
        output
    }
}

/// Start a new round's text in the turn-wide stream, on its own paragraph.
fn append_round(streamed: &mut String, text: &str) {
    if !streamed.is_empty() {
        streamed.push_str("\n\n");
    }
    streamed.push_str(text);
}
