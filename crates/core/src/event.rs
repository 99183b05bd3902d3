//! Domain event system: decoupled observation of turn processing.
//!
//! The orchestrator publishes an event at each phase of a turn. Subscribers
//! (logging, tests, dashboards) react without coupling to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::route::RouteDecision;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A user message was accepted and appended
    TurnStarted {
        thread_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The router chose a handler
    RouteDecided {
        thread_id: String,
        route: RouteDecision,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        thread_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Old turns were folded into a summary
    ThreadCompacted {
        thread_id: String,
        retired_turns: usize,
        timestamp: DateTime<Utc>,
    },

    /// The assistant turn was appended
    TurnCompleted {
        thread_id: String,
        route: RouteDecision,
        answer_chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// The turn ended with an error event
    TurnFailed {
        thread_id: String,
        code: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
