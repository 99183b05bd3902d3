//! Turn-level streaming events.
//!
//! `TurnEvent` is what a caller of the orchestrator receives for one turn.
//! Every turn ends with exactly one terminal event: `final_message` on
//! success or `error` on failure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Cumulative answer text so far.
    Message { content: String },

    /// The complete answer, identical to the appended assistant turn.
    FinalMessage { content: String },

    /// The turn failed; no assistant turn was appended.
    Error { error: String, code: String },
}

impl TurnEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::FinalMessage { .. } => "final_message",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Message { .. })
    }
}
