//! Error types for the FBot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; [`TurnError`] is what a
//! caller of the orchestrator sees.

use thiserror::Error;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the durable stores (threads, tasks) and the other
/// collaborators sitting behind tools.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// No pooled connection became available before the acquire timeout.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The payload failed schema validation. The handler feeds this back to
    /// the model so it can ask the user or reformulate.
    #[error("Invalid input for {tool_name}: {reason}")]
    InvalidInput { tool_name: String, reason: String },
}

impl ToolError {
    pub fn invalid(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that end a turn. Each one is surfaced to the caller as a single
/// error event; none of them produce an assistant turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Routing failed: {0}")]
    Routing(ProviderError),

    #[error("Handling failed: {0}")]
    Handling(ProviderError),

    #[error("Thread {0} already has a turn in progress")]
    ConcurrentTurn(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("State store failure: {0}")]
    Store(#[from] StoreError),
}

impl TurnError {
    /// Short machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            TurnError::Routing(_) => "routing_failure",
            TurnError::Handling(_) => "handling_failure",
            TurnError::ConcurrentTurn(_) => "turn_in_progress",
            TurnError::ThreadNotFound(_) => "thread_not_found",
            TurnError::Store(StoreError::Unavailable(_)) => "service_unavailable",
            TurnError::Store(_) => "store_failure",
        }
    }
}
