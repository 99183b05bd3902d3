//! Tool adapters for FBot handlers.
//!
//! Each tool wraps one external collaborator (knowledge base, task store,
//! analytics engine, web search) behind a validated JSON interface.
//! Handlers are given explicit subsets of these at construction time.

pub mod analytics;
pub mod date;
pub mod knowledge;
pub mod tasks;
pub mod tavily;
pub mod web_search;

pub use analytics::RunAnalyticsTool;
pub use knowledge::{NO_KNOWLEDGE, RetrieveKnowledgeTool};
pub use tasks::{CreateTaskTool, DeleteTaskTool, ListTasksTool, UpdateTaskTool, task_tools};
pub use tavily::TavilySearch;
pub use web_search::WebSearchTool;
