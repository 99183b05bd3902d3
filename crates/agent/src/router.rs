//! The router: one classifier call per turn that picks a handler.

use fbot_core::error::ProviderError;
use fbot_core::message::Message;
use fbot_core::provider::{Provider, ProviderRequest};
use fbot_core::route::RouteDecision;
use fbot_core::thread::{ConversationThread, Turn};
use std::sync::Arc;
use tracing::debug;

use crate::prompts::{ROUTER_PROMPT, render};

pub struct Router {
    provider: Arc<dyn Provider>,
    model: String,
    history_window: usize,
}

impl Router {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            history_window: 10,
        }
    }

    /// How many prior turns the classifier sees.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Classify `message` in the context of the thread's earlier turns.
    ///
    /// `thread` may already end with the user turn carrying `message`; that
    /// turn is not repeated in the history block. Unrecognized replies route
    /// to [`RouteDecision::General`]; only a provider failure is an error.
    pub async fn route(&self, thread: &ConversationThread, message: &str) -> Result<RouteDecision, ProviderError> {
        let turns = thread.turns();
        let prior = match turns.last() {
            Some(last) if !last.is_summary() && last.content() == message => &turns[..turns.len() - 1],
            _ => turns,
        };
        let start = prior.len().saturating_sub(self.history_window);
        let history = prior[start..]
            .iter()
            .map(Turn::labeled_line)
            .collect::<Vec<_>>()
            .join("\n");
        let history = if history.is_empty() { "(none)".to_string() } else { history };

        let prompt = render(ROUTER_PROMPT, &[("history", &history), ("message", message)]);
        let request = ProviderRequest::new(&self.model, vec![Message::user(prompt)])
            .with_temperature(0.0)
            .with_max_tokens(16);

        let response = self.provider.complete(request).await?;
        let decision = RouteDecision::from_reply(&response.message.content);
        debug!(
            thread_id = %thread.id,
            reply = %response.message.content.trim(),
            route = %decision,
            "Routing decision"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;

    #[tokio::test]
    async fn parses_reply_and_uses_temperature_zero() {
        let provider = Arc::new(ScriptedProvider::texts(&["Task"]));
        let router = Router::new(provider.clone(), "router-model");
        let mut thread = ConversationThread::new("u");
        thread.append(Turn::user("add a task"));

        assert_eq!(router.route(&thread, "add a task").await.unwrap(), RouteDecision::Task);

        let request = &provider.requests()[0];
        assert_eq!(request.model, "router-model");
        assert!(request.temperature.abs() < f32::EPSILON);
        assert!(request.tools.is_empty());
        let prompt = &request.messages[0].content;
        assert!(prompt.contains("Current request: add a task"));
        assert!(prompt.contains("Conversation history:\n(none)"));
    }

    #[tokio::test]
    async fn unknown_reply_falls_back_to_general() {
        let provider = Arc::new(ScriptedProvider::texts(&["I am not sure"]));
        let router = Router::new(provider, "m");
        let thread = ConversationThread::new("u");
        assert_eq!(router.route(&thread, "hello").await.unwrap(), RouteDecision::General);
    }

    #[tokio::test]
    async fn history_is_windowed() {
        let provider = Arc::new(ScriptedProvider::texts(&["knowledge"]));
        let router = Router::new(provider.clone(), "m").with_history_window(2);
        let mut thread = ConversationThread::new("u");
        for i in 0..5 {
            thread.append(Turn::user(format!("question {i}")));
            thread.append(Turn::assistant(format!("answer {i}")));
        }
        thread.append(Turn::user("and the fees?"));

        router.route(&thread, "and the fees?").await.unwrap();
        let prompt = &provider.requests()[0].messages[0].content;
        assert!(prompt.contains("User: question 4\nAssistant: answer 4\n\nCurrent request"));
        assert!(!prompt.contains("answer 3"));
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Timeout("slow".into()))]));
        let router = Router::new(provider, "m");
        let err = router.route(&ConversationThread::new("u"), "hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }
}
