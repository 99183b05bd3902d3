//! Conversation threads, turns, and the thread store trait.
//!
//! A [`ConversationThread`] is the persisted, append-only history of one
//! conversation. Only the orchestrator mutates it; handlers read a snapshot
//! of its turns and return an answer string.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::message::Message;
use crate::route::RouteDecision;

/// Opaque thread identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    /// A fresh v4 UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message of a thread. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    role: TurnRole,
    content: String,
    created_at: DateTime<Utc>,
    /// Set on the synthetic turn that stands in for compacted history.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    summary: bool,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content, false)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content, false)
    }

    /// The synthetic turn produced by compaction.
    pub fn summary(synopsis: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, synopsis, true)
    }

    fn new(role: TurnRole, content: impl Into<String>, summary: bool) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
            summary,
        }
    }

    pub fn role(&self) -> TurnRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_summary(&self) -> bool {
        self.summary
    }

    /// Role-labeled line used in classifier and summarizer prompts.
    pub fn labeled_line(&self) -> String {
        let label = match (self.summary, self.role) {
            (true, _) => "Summary",
            (false, TurnRole::User) => "User",
            (false, TurnRole::Assistant) => "Assistant",
        };
        format!("{label}: {}", self.content)
    }

    /// Convert to a provider message.
    pub fn to_message(&self) -> Message {
        match (self.summary, self.role) {
            (true, _) => Message::system(format!(
                "Summary of the earlier conversation:\n{}",
                self.content
            )),
            (false, TurnRole::User) => Message::user(&self.content),
            (false, TurnRole::Assistant) => Message::assistant(&self.content),
        }
    }
}

/// A persisted conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    pub id: ThreadId,

    /// Externally supplied owner of the thread's tasks and analytics.
    pub user_id: String,

    turns: Vec<Turn>,

    /// Handler chosen for the turn in progress. Cleared when the turn ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_decision: Option<RouteDecision>,

    #[serde(default)]
    running_summary: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ConversationThread {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_id(ThreadId::new(), user_id)
    }

    pub fn with_id(id: ThreadId, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: user_id.into(),
            turns: Vec::new(),
            route_decision: None,
            running_summary: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a thread from persisted parts.
    pub fn from_parts(
        id: ThreadId,
        user_id: String,
        turns: Vec<Turn>,
        route_decision: Option<RouteDecision>,
        running_summary: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            turns,
            route_decision,
            running_summary,
            created_at,
            updated_at,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn running_summary(&self) -> &str {
        &self.running_summary
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Total characters across active turns.
    pub fn char_count(&self) -> usize {
        self.turns.iter().map(|t| t.content.chars().count()).sum()
    }

    /// Append a turn at the end of the history.
    pub fn append(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// Replace the oldest `retired` turns with a single summary turn.
    ///
    /// Returns the number of turns removed; zero when `retired` does not
    /// describe a proper prefix of the history.
    pub fn compact(&mut self, retired: usize, synopsis: impl Into<String>) -> usize {
        if retired == 0 || retired >= self.turns.len() {
            return 0;
        }
        let synopsis = synopsis.into();
        self.turns.splice(..retired, [Turn::summary(synopsis.clone())]);
        self.running_summary = synopsis;
        self.updated_at = Utc::now();
        retired
    }

    /// The last `window` turns rendered as role-labeled lines.
    pub fn render_recent(&self, window: usize) -> String {
        let start = self.turns.len().saturating_sub(window);
        self.turns[start..]
            .iter()
            .map(Turn::labeled_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Thread metadata returned when a thread is created or listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub thread_id: ThreadId,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub turn_count: usize,
}

impl From<&ConversationThread> for ThreadInfo {
    fn from(thread: &ConversationThread) -> Self {
        Self {
            thread_id: thread.id.clone(),
            user_id: thread.user_id.clone(),
            created_at: thread.created_at,
            turn_count: thread.len(),
        }
    }
}

/// Durable storage for conversation threads, keyed by thread id.
///
/// The store is the single source of truth for history: the orchestrator
/// loads a thread at the start of every turn and saves it after each
/// mutation.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// A human-readable backend name (e.g. "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert a new thread. Fails if the id already exists.
    async fn create(&self, thread: &ConversationThread) -> std::result::Result<(), StoreError>;

    async fn load(&self, id: &ThreadId) -> std::result::Result<Option<ConversationThread>, StoreError>;

    /// Insert or replace the full thread state.
    async fn save(&self, thread: &ConversationThread) -> std::result::Result<(), StoreError>;

    async fn list_for_user(&self, user_id: &str) -> std::result::Result<Vec<ThreadInfo>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_with(n: usize) -> ConversationThread {
        let mut thread = ConversationThread::new("user-1");
        for i in 0..n {
            if i % 2 == 0 {
                thread.append(Turn::user(format!("question {i}")));
            } else {
                thread.append(Turn::assistant(format!("answer {i}")));
            }
        }
        thread
    }

    #[test]
    fn append_preserves_order() {
        let thread = thread_with(4);
        let contents: Vec<_> = thread.turns().iter().map(|t| t.content()).collect();
        assert_eq!(contents, vec!["question 0", "answer 1", "question 2", "answer 3"]);
        assert!(thread.updated_at >= thread.created_at);
    }

    #[test]
    fn compact_replaces_prefix_with_one_summary_turn() {
        let mut thread = thread_with(10);
        let recent: Vec<Turn> = thread.turns()[6..].to_vec();

        let removed = thread.compact(6, "The user asked about deadlines.");
        assert_eq!(removed, 6);
        assert_eq!(thread.len(), 5);
        assert!(thread.turns()[0].is_summary());
        assert_eq!(thread.running_summary(), "The user asked about deadlines.");
        assert_eq!(&thread.turns()[1..], recent.as_slice());
    }

    #[test]
    fn compact_refuses_to_retire_everything() {
        let mut thread = thread_with(3);
        assert_eq!(thread.compact(3, "x"), 0);
        assert_eq!(thread.compact(0, "x"), 0);
        assert_eq!(thread.len(), 3);
        assert!(thread.running_summary().is_empty());
    }

    #[test]
    fn render_recent_uses_role_labels() {
        let mut thread = thread_with(4);
        thread.compact(2, "earlier stuff");
        let rendered = thread.render_recent(10);
        assert!(rendered.starts_with("Summary: earlier stuff"));
        assert!(rendered.contains("User: question 2"));
        assert!(rendered.ends_with("Assistant: answer 3"));
        assert_eq!(thread.render_recent(1), "Assistant: answer 3");
    }

    #[test]
    fn summary_turn_becomes_system_message() {
        let msg = Turn::summary("recap").to_message();
        assert_eq!(msg.role, crate::message::Role::System);
        assert!(msg.content.contains("recap"));
    }

    #[test]
    fn thread_serialization_roundtrip() {
        let mut thread = thread_with(2);
        thread.route_decision = Some(RouteDecision::Task);
        let json = serde_json::to_string(&thread).unwrap();
        let back: ConversationThread = serde_json::from_str(&json).unwrap();
        assert_eq!(back.turns(), thread.turns());
        assert_eq!(back.route_decision, Some(RouteDecision::Task));
        assert_eq!(back.user_id, "user-1");
    }
}
