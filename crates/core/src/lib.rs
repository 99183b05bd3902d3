//! # FBot Core
//!
//! Domain types, traits, and error definitions for the FBot assistant.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Layout
//!
//! Each collaborator is a trait here and its implementations live elsewhere:
//! - [`Provider`]: the language model (`fbot-providers`)
//! - [`ThreadStore`], [`TaskStore`], [`KnowledgeSource`], [`AnalyticsEngine`]
//!   (`fbot-store`)
//! - [`SearchBackend`] and every [`Tool`] (`fbot-tools`)

pub mod analytics;
pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod route;
pub mod task;
pub mod thread;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use analytics::{AnalyticsEngine, AnalyticsKind, DateRange};
pub use error::{ProviderError, StoreError, ToolError, TurnError};
pub use event::{DomainEvent, EventBus};
pub use knowledge::{KnowledgeSource, Passage, SearchBackend, SearchHit};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use route::RouteDecision;
pub use task::{NewTask, Priority, Task, TaskPatch, TaskStore};
pub use thread::{ConversationThread, ThreadId, ThreadInfo, ThreadStore, Turn, TurnRole};
pub use tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResult};
