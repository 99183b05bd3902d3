//! The handler pool: one handler per route, each with its own tool subset.

use fbot_core::analytics::AnalyticsEngine;
use fbot_core::event::EventBus;
use fbot_core::knowledge::{KnowledgeSource, SearchBackend};
use fbot_core::provider::Provider;
use fbot_core::route::RouteDecision;
use fbot_core::task::TaskStore;
use fbot_core::tool::ToolRegistry;
use fbot_tools::{RetrieveKnowledgeTool, RunAnalyticsTool, WebSearchTool, task_tools};
use std::sync::Arc;

use crate::handler::{Handler, HandlerSettings};

/// External collaborators the tools delegate to.
#[derive(Clone)]
pub struct Collaborators {
    pub knowledge: Arc<dyn KnowledgeSource>,
    pub tasks: Arc<dyn TaskStore>,
    pub analytics: Arc<dyn AnalyticsEngine>,
    /// `None` when no search API key is configured.
    pub search: Option<Arc<dyn SearchBackend>>,
    pub knowledge_top_k: usize,
    pub search_max_results: usize,
}

pub struct HandlerPool {
    knowledge: Handler,
    task: Handler,
    analytics: Handler,
    general: Handler,
}

impl HandlerPool {
    /// Build the four handlers. Tool subsets are fixed here and never change.
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: HandlerSettings,
        collaborators: Collaborators,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let knowledge_tools = ToolRegistry::new().with(Box::new(
            RetrieveKnowledgeTool::new(collaborators.knowledge).with_top_k(collaborators.knowledge_top_k),
        ));

        let mut task_registry = ToolRegistry::new();
        for tool in task_tools(collaborators.tasks) {
            task_registry.register(tool);
        }

        let analytics_tools = ToolRegistry::new().with(Box::new(RunAnalyticsTool::new(collaborators.analytics)));

        let general_tools = ToolRegistry::new().with(Box::new(
            WebSearchTool::new(collaborators.search).with_max_results(collaborators.search_max_results),
        ));

        let build = |kind, tools| {
            Handler::new(kind, provider.clone(), tools, settings.clone()).with_event_bus(event_bus.clone())
        };

        Self {
            knowledge: build(RouteDecision::Knowledge, knowledge_tools),
            task: build(RouteDecision::Task, task_registry),
            analytics: build(RouteDecision::Analytics, analytics_tools),
            general: build(RouteDecision::General, general_tools),
        }
    }

    /// Every route maps to exactly one handler.
    pub fn get(&self, route: RouteDecision) -> &Handler {
        match route {
            RouteDecision::Knowledge => &self.knowledge,
            RouteDecision::Task => &self.task,
            RouteDecision::Analytics => &self.analytics,
            RouteDecision::General => &self.general,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use fbot_store::{InMemoryTaskStore, KeywordKnowledgeBase, TaskAnalytics};

    fn collaborators() -> Collaborators {
        let tasks: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        Collaborators {
            knowledge: Arc::new(KeywordKnowledgeBase::new()),
            analytics: Arc::new(TaskAnalytics::new(tasks.clone())),
            tasks,
            search: None,
            knowledge_top_k: 3,
            search_max_results: 3,
        }
    }

    #[test]
    fn each_handler_gets_its_tool_subset() {
        let pool = HandlerPool::new(
            Arc::new(ScriptedProvider::texts(&[])),
            HandlerSettings::new("m"),
            collaborators(),
            Arc::new(EventBus::default()),
        );

        assert_eq!(pool.get(RouteDecision::Knowledge).tool_names(), vec!["retrieve_knowledge"]);
        assert_eq!(
            pool.get(RouteDecision::Task).tool_names(),
            vec!["create_task", "delete_task", "list_tasks", "update_task"]
        );
        assert_eq!(pool.get(RouteDecision::Analytics).tool_names(), vec!["run_analytics"]);
        assert_eq!(pool.get(RouteDecision::General).tool_names(), vec!["web_search"]);

        for route in RouteDecision::PRECEDENCE {
            assert_eq!(pool.get(route).kind(), route);
        }
    }
}
