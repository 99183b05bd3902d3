//! `fbot chat`: interactive or single-message chat against one thread.

use anyhow::Context;
use fbot_agent::{Orchestrator, TurnEvent};
use fbot_core::thread::ThreadId;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
    thread: Option<String>,
    user: Option<String>,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set FBOT_API_KEY or OPENAI_API_KEY, or add api_key to:");
        eprintln!("    {}", super::config_path(config_path).display());
        eprintln!();
        anyhow::bail!("No API key found. See above for setup instructions.");
    }

    let orchestrator = fbot_gateway::build_orchestrator(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to start the assistant")?;

    let thread_id = match thread {
        Some(id) => ThreadId::from(id),
        None => orchestrator.create_thread(user.as_deref()).await?.id,
    };

    info!(thread_id = %thread_id, "Chat session started");

    if let Some(msg) = message {
        send(&orchestrator, &thread_id, user.as_deref(), &msg, "").await?;
        return Ok(());
    }

    println!();
    println!("  FBot, interactive mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Thread:    {thread_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        print!("  FBot > ");
        if let Err(e) = send(&orchestrator, &thread_id, user.as_deref(), line, "         ").await {
            eprintln!("  [Error] {e}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!("  Resume with: fbot chat --thread {thread_id}");
    println!();
    Ok(())
}

/// Run one turn and echo its events to stdout as they arrive.
async fn send(
    orchestrator: &Arc<Orchestrator>,
    thread_id: &ThreadId,
    user: Option<&str>,
    message: &str,
    indent: &str,
) -> anyhow::Result<()> {
    debug!(thread_id = %thread_id, "Submitting message");
    let mut rx = orchestrator.submit_message_for(thread_id, user, message).await?;

    let mut printer = StreamPrinter::new(indent);
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        if let TurnEvent::Error { error, code } = &event {
            println!();
            anyhow::bail!("{error} ({code})");
        }
        if let Some(text) = printer.push(&event) {
            write!(stdout, "{text}")?;
            stdout.flush()?;
        }
    }
    println!();
    Ok(())
}

/// Turns cumulative `message` snapshots into incremental terminal output.
/// `final_message` holds only the last round's text, so it is printed only
/// when the stream did not already show it.
struct StreamPrinter {
    printed: String,
    indent: String,
}

impl StreamPrinter {
    fn new(indent: &str) -> Self {
        Self {
            printed: String::new(),
            indent: indent.to_string(),
        }
    }

    /// Text to write for `event`, if any.
    fn push(&mut self, event: &TurnEvent) -> Option<String> {
        let content = match event {
            TurnEvent::Message { content } => content,
            // Already on screen as the last round of the turn.
            TurnEvent::FinalMessage { content } if self.printed.ends_with(content.as_str()) => return None,
            TurnEvent::FinalMessage { content } => content,
            TurnEvent::Error { .. } => return None,
        };

        let out = match content.strip_prefix(self.printed.as_str()) {
            Some("") => return None,
            Some(delta) => delta.to_string(),
            // A new round restarted the text.
            None => format!("\n{content}"),
        };
        self.printed = content.clone();
        Some(out.replace('\n', &format!("\n{}", self.indent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: &str) -> TurnEvent {
        TurnEvent::Message {
            content: content.into(),
        }
    }

    #[test]
    fn prints_only_new_text() {
        let mut printer = StreamPrinter::new("");
        assert_eq!(printer.push(&message("Xin")).as_deref(), Some("Xin"));
        assert_eq!(printer.push(&message("Xin chào")).as_deref(), Some(" chào"));
        assert_eq!(
            printer.push(&TurnEvent::FinalMessage {
                content: "Xin chào".into()
            }),
            None
        );
    }

    #[test]
    fn final_message_after_tool_round_is_not_repeated() {
        let mut printer = StreamPrinter::new("");
        printer.push(&message("Let me check."));
        assert_eq!(
            printer.push(&message("Let me check.\n\nYou have 2 tasks.")).as_deref(),
            Some("\n\nYou have 2 tasks.")
        );
        let last = TurnEvent::FinalMessage {
            content: "You have 2 tasks.".into(),
        };
        assert_eq!(printer.push(&last), None);
    }

    #[test]
    fn restarted_round_begins_new_line() {
        let mut printer = StreamPrinter::new("  ");
        printer.push(&message("Let me check"));
        assert_eq!(printer.push(&message("You have")).as_deref(), Some("\n  You have"));
    }

    #[test]
    fn errors_print_nothing() {
        let mut printer = StreamPrinter::new("");
        let event = TurnEvent::Error {
            error: "boom".into(),
            code: "routing_failure".into(),
        };
        assert!(printer.push(&event).is_none());
    }
}
