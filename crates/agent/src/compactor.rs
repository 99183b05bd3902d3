//! Context compaction: fold old turns into a summary turn.
//!
//! Runs at the start of a turn when the thread exceeds a turn count or
//! character budget. The most recent `keep_recent` turns always survive
//! verbatim. Any failure leaves the thread untouched.

use fbot_config::CompactionConfig;
use fbot_core::message::Message;
use fbot_core::provider::{Provider, ProviderRequest};
use fbot_core::thread::{ConversationThread, Turn};
use std::sync::Arc;
use tracing::{info, warn};

use crate::prompts::{COMPACTION_PROMPT, render};

/// Upper bound on summary sentences.
pub const MAX_SUMMARY_SENTENCES: usize = 7;

pub struct Compactor {
    provider: Arc<dyn Provider>,
    model: String,
    settings: CompactionConfig,
}

impl Compactor {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, settings: CompactionConfig) -> Self {
        Self {
            provider,
            model: model.into(),
            settings,
        }
    }

    /// Over budget, with at least one turn besides the existing summary to
    /// retire. Re-summarizing a lone summary would never shrink the thread.
    pub fn needs_compaction(&self, thread: &ConversationThread) -> bool {
        if !self.settings.enabled || thread.len() <= self.settings.keep_recent {
            return false;
        }
        let retire = thread.len() - self.settings.keep_recent;
        thread.turns()[..retire].iter().any(|t| !t.is_summary())
            && (thread.len() > self.settings.max_turns || thread.char_count() > self.settings.max_chars)
    }

    /// Compact the thread if it is over budget. Returns the number of turns
    /// retired, zero when nothing changed.
    pub async fn maybe_compact(&self, thread: &mut ConversationThread) -> usize {
        if !self.needs_compaction(thread) {
            return 0;
        }
        let retire = thread.len() - self.settings.keep_recent;
        let history = thread.turns()[..retire]
            .iter()
            .map(Turn::labeled_line)
            .collect::<Vec<_>>()
            .join("\n");

        let request = ProviderRequest::new(
            &self.model,
            vec![Message::user(render(COMPACTION_PROMPT, &[("history", &history)]))],
        )
        .with_temperature(0.0)
        .with_max_tokens(512);

        let summary = match self.provider.complete(request).await {
            Ok(response) => limit_sentences(response.message.content.trim(), MAX_SUMMARY_SENTENCES),
            Err(e) => {
                warn!(thread_id = %thread.id, error = %e, "Summarization failed, skipping compaction");
                return 0;
            }
        };
        if summary.is_empty() {
            warn!(thread_id = %thread.id, "Empty summary, skipping compaction");
            return 0;
        }

        let retired = thread.compact(retire, summary);
        info!(thread_id = %thread.id, retired, remaining = thread.len(), "Thread compacted");
        retired
    }
}

/// Keep at most `max` sentences. A sentence ends at `.`, `!` or `?`
/// followed by whitespace or the end of the text.
pub fn limit_sentences(text: &str, max: usize) -> String {
    let mut count = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|(_, next)| next.is_whitespace()) {
            count += 1;
            if count == max {
                return text[..i + c.len_utf8()].to_string();
            }
        }
    }
    text.to_string()
}
