//! Assemble an [`Orchestrator`] from configuration.
//!
//! Shared by the HTTP server and the CLI chat command so both run the same
//! stores, tools and provider.

use fbot_agent::{Collaborators, Orchestrator};
use fbot_config::AppConfig;
use fbot_core::event::EventBus;
use fbot_core::knowledge::{KnowledgeSource, SearchBackend};
use fbot_store::{KeywordKnowledgeBase, PoolSettings, Stores};
use fbot_tools::TavilySearch;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::BoxError;

/// Open the configured stores and knowledge base and build the orchestrator.
pub async fn build_orchestrator(config: &AppConfig) -> Result<Arc<Orchestrator>, BoxError> {
    config.validate()?;

    let provider = fbot_providers::build_provider(config);

    let stores = Stores::open(
        &config.storage.database_url,
        PoolSettings {
            max_connections: config.storage.max_connections,
            acquire_timeout: Duration::from_secs(config.storage.acquire_timeout_secs),
        },
    )
    .await?;

    let knowledge: Arc<dyn KnowledgeSource> = match &config.knowledge.docs_dir {
        Some(dir) => Arc::new(
            KeywordKnowledgeBase::load_dir(dir, config.knowledge.chunk_size, config.knowledge.chunk_overlap).await?,
        ),
        None => {
            warn!("No knowledge.docs_dir configured, knowledge answers will decline");
            Arc::new(KeywordKnowledgeBase::new())
        }
    };

    let search = config
        .search
        .api_key
        .as_ref()
        .map(|key| Arc::new(TavilySearch::new(key.clone())) as Arc<dyn SearchBackend>);
    if search.is_none() {
        info!("Web search disabled (no search.api_key)");
    }

    let collaborators = Collaborators {
        knowledge,
        tasks: stores.tasks.clone(),
        analytics: Arc::new(stores.analytics()),
        search,
        knowledge_top_k: config.knowledge.top_k,
        search_max_results: config.search.max_results,
    };

    let event_bus = Arc::new(EventBus::default());
    Ok(Arc::new(Orchestrator::new(
        config,
        provider,
        stores.threads.clone(),
        collaborators,
        event_bus,
    )))
}
