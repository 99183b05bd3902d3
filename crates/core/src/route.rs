//! Route decisions: which handler processes a turn.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of handler identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Institutional knowledge lookup
    Knowledge,
    /// Task and schedule management
    Task,
    /// Analytics and advice over the user's tasks
    Analytics,
    /// Everything else
    General,
}

impl RouteDecision {
    /// Precedence order used when parsing a classifier reply.
    pub const PRECEDENCE: [RouteDecision; 4] = [
        RouteDecision::Knowledge,
        RouteDecision::Task,
        RouteDecision::Analytics,
        RouteDecision::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::Knowledge => "knowledge",
            RouteDecision::Task => "task",
            RouteDecision::Analytics => "analytics",
            RouteDecision::General => "general",
        }
    }

    /// Parse a free-text classifier reply.
    ///
    /// Case-insensitive substring match against the canonical identifiers in
    /// [`Self::PRECEDENCE`] order. Anything unrecognized falls back to
    /// [`RouteDecision::General`], so this never fails.
    pub fn from_reply(reply: &str) -> Self {
        let lowered = reply.to_lowercase();
        Self::PRECEDENCE
            .into_iter()
            .find(|route| lowered.contains(route.as_str()))
            .unwrap_or(RouteDecision::General)
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
