//! A canned provider and orchestrator for the gateway tests.

use async_trait::async_trait;
use fbot_agent::{Collaborators, Orchestrator};
use fbot_config::AppConfig;
use fbot_core::error::ProviderError;
use fbot_core::event::EventBus;
use fbot_core::message::{Message, Role};
use fbot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use fbot_core::thread::ThreadStore;
use fbot_store::{KeywordKnowledgeBase, Stores};
use std::sync::Arc;

/// Routes everything to `general` and answers `echo: <last user message>`.
pub struct EchoProvider;

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let is_routing = request
            .messages
            .first()
            .is_some_and(|m| m.role == Role::User && m.content.starts_with("You are the routing step"));
        let reply = if is_routing {
            "general".to_string()
        } else {
            let last_user = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            format!("echo: {last_user}")
        };
        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: None,
            model: request.model,
        })
    }
}

pub fn orchestrator_with_store() -> (Arc<Orchestrator>, Arc<dyn ThreadStore>) {
    let stores = Stores::in_memory();
    let collaborators = Collaborators {
        knowledge: Arc::new(KeywordKnowledgeBase::new()),
        tasks: stores.tasks.clone(),
        analytics: Arc::new(stores.analytics()),
        search: None,
        knowledge_top_k: 3,
        search_max_results: 3,
    };
    let orchestrator = Orchestrator::new(
        &AppConfig::default(),
        Arc::new(EchoProvider),
        stores.threads.clone(),
        collaborators,
        Arc::new(EventBus::default()),
    );
    (Arc::new(orchestrator), stores.threads)
}

pub fn echo_orchestrator() -> Arc<Orchestrator> {
    orchestrator_with_store().0
}
