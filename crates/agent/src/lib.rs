//! The orchestration engine for FBot.
//!
//! Each user message goes through one turn:
//!
//! 1. **Compact** the thread if it has grown past its budget
//! 2. **Append** the user turn
//! 3. **Route** it to one of four handlers with a single classifier call
//! 4. **Handle** it: the handler runs a bounded tool loop and streams text
//! 5. **Append** the answer as an assistant turn and emit it
//!
//! Turns on one thread never overlap; turns on different threads run
//! concurrently.

pub mod compactor;
pub mod engine;
pub mod handler;
pub mod pool;
pub mod prompts;
pub mod router;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use compactor::Compactor;
pub use engine::{Orchestrator, TurnPhase};
pub use handler::{Handler, HandlerSettings};
pub use pool::{Collaborators, HandlerPool};
pub use router::Router;
pub use stream_event::TurnEvent;
