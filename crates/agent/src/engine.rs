//! The orchestration engine.
//!
//! A turn moves through `Idle → Routing → Handling → Appending → Idle`.
//! Each user message gets exactly one routing decision and one handler
//! invocation; the caller receives cumulative `message` events followed by
//! exactly one terminal `final_message` or `error` event.
//!
//! Turns on the same thread are serialized by a per-thread lock that is
//! moved into the spawned turn task, so it is released on every exit path,
//! including a caller that stops reading the stream.

use chrono::Utc;
use fbot_config::{AppConfig, OnBusy};
use fbot_core::error::TurnError;
use fbot_core::event::{DomainEvent, EventBus};
use fbot_core::provider::Provider;
use fbot_core::thread::{ConversationThread, ThreadId, ThreadInfo, ThreadStore, Turn};
use fbot_core::tool::ToolContext;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, mpsc};
use tracing::{debug, info, warn};

use crate::compactor::Compactor;
use crate::handler::HandlerSettings;
use crate::pool::{Collaborators, HandlerPool};
use crate::router::Router;
use crate::stream_event::TurnEvent;

/// Buffered events per turn before the handler waits on a slow reader.
const EVENT_BUFFER: usize = 64;

/// Where a thread's current turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Routing,
    Handling,
    Appending,
}

/// Per-thread turn locks.
#[derive(Default)]
struct ThreadLocks {
    slots: Mutex<HashMap<ThreadId, Arc<AsyncMutex<()>>>>,
}

impl ThreadLocks {
    fn slot(&self, id: &ThreadId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.len() > 1024 {
            slots.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        slots.entry(id.clone()).or_default().clone()
    }

    async fn acquire(&self, id: &ThreadId, on_busy: OnBusy) -> Result<OwnedMutexGuard<()>, TurnError> {
        let slot = self.slot(id);
        match on_busy {
            OnBusy::Reject => slot
                .try_lock_owned()
                .map_err(|_| TurnError::ConcurrentTurn(id.to_string())),
            OnBusy::Queue => Ok(slot.lock_owned().await),
        }
    }
}

pub struct Orchestrator {
    router: Router,
    handlers: HandlerPool,
    compactor: Compactor,
    threads: Arc<dyn ThreadStore>,
    locks: ThreadLocks,
    phases: Mutex<HashMap<ThreadId, TurnPhase>>,
    on_busy: OnBusy,
    default_user_id: String,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        threads: Arc<dyn ThreadStore>,
        collaborators: Collaborators,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let router = Router::new(provider.clone(), config.router_model())
            .with_history_window(config.orchestrator.history_window);

        let settings = HandlerSettings {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            max_rounds: config.orchestrator.max_tool_rounds,
        };
        let handlers = HandlerPool::new(provider.clone(), settings, collaborators, event_bus.clone());
        let compactor = Compactor::new(provider, config.default_model.clone(), config.compaction.clone());

        Self {
            router,
            handlers,
            compactor,
            threads,
            locks: ThreadLocks::default(),
            phases: Mutex::new(HashMap::new()),
            on_busy: config.orchestrator.on_busy,
            default_user_id: config.orchestrator.default_user_id.clone(),
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn default_user_id(&self) -> &str {
        &self.default_user_id
    }

    /// Current phase of a thread's turn.
    pub fn phase(&self, id: &ThreadId) -> TurnPhase {
        self.phases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .copied()
            .unwrap_or(TurnPhase::Idle)
    }

    fn set_phase(&self, id: &ThreadId, phase: TurnPhase) {
        let mut phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        if phase == TurnPhase::Idle {
            phases.remove(id);
        } else {
            phases.insert(id.clone(), phase);
        }
    }

    // ── Threads ──

    /// Create and persist an empty thread.
    pub async fn create_thread(&self, user_id: Option<&str>) -> Result<ConversationThread, TurnError> {
        let thread = ConversationThread::new(user_id.unwrap_or(&self.default_user_id));
        self.threads.create(&thread).await?;
        info!(thread_id = %thread.id, user_id = %thread.user_id, "Thread created");
        Ok(thread)
    }

    pub async fn get_thread(&self, id: &ThreadId) -> Result<ConversationThread, TurnError> {
        self.threads
            .load(id)
            .await?
            .ok_or_else(|| TurnError::ThreadNotFound(id.to_string()))
    }

    pub async fn list_threads(&self, user_id: &str) -> Result<Vec<ThreadInfo>, TurnError> {
        Ok(self.threads.list_for_user(user_id).await?)
    }

    // ── Turns ──

    /// Submit a user message on a thread owned by the default user.
    pub async fn submit_message(
        self: &Arc<Self>,
        thread_id: &ThreadId,
        message: impl Into<String>,
    ) -> Result<mpsc::Receiver<TurnEvent>, TurnError> {
        self.submit_message_for(thread_id, None, message).await
    }

    /// Submit a user message and get the turn's event stream.
    ///
    /// An unknown thread id is created on the fly for `user_id` (or the
    /// default user). Fails up front with [`TurnError::ConcurrentTurn`] when
    /// the thread is busy and busy threads are rejected, or with a store
    /// error when the thread cannot be loaded. Everything after that is
    /// reported on the stream.
    pub async fn submit_message_for(
        self: &Arc<Self>,
        thread_id: &ThreadId,
        user_id: Option<&str>,
        message: impl Into<String>,
    ) -> Result<mpsc::Receiver<TurnEvent>, TurnError> {
        let message = message.into();
        let guard = self.locks.acquire(thread_id, self.on_busy).await?;

        let thread = match self.threads.load(thread_id).await? {
            Some(thread) => thread,
            None => {
                let thread =
                    ConversationThread::with_id(thread_id.clone(), user_id.unwrap_or(&self.default_user_id));
                self.threads.create(&thread).await?;
                debug!(thread_id = %thread.id, "Thread created on first message");
                thread
            }
        };

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = Arc::clone(self);
        let id = thread_id.clone();
        tokio::spawn(async move {
            this.run_turn(thread, message, &tx).await;
            this.set_phase(&id, TurnPhase::Idle);
            // Release the thread before closing the stream, so a caller that
            // saw the end of the stream can submit again immediately.
            drop(guard);
            drop(tx);
        });
        Ok(rx)
    }

    async fn run_turn(&self, mut thread: ConversationThread, message: String, tx: &mpsc::Sender<TurnEvent>) {
        let thread_id = thread.id.clone();
        self.event_bus.publish(DomainEvent::TurnStarted {
            thread_id: thread_id.to_string(),
            content_preview: message.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        let retired = self.compactor.maybe_compact(&mut thread).await;
        if retired > 0 {
            self.event_bus.publish(DomainEvent::ThreadCompacted {
                thread_id: thread_id.to_string(),
                retired_turns: retired,
                timestamp: Utc::now(),
            });
        }

        thread.append(Turn::user(&message));
        if let Err(e) = self.threads.save(&thread).await {
            return self.fail(tx, &thread_id, e.into()).await;
        }

        // ── Routing ──
        self.set_phase(&thread_id, TurnPhase::Routing);
        let route = match self.router.route(&thread, &message).await {
            Ok(route) => route,
            Err(e) => return self.fail(tx, &thread_id, TurnError::Routing(e)).await,
        };
        thread.route_decision = Some(route);
        info!(thread_id = %thread_id, %route, "Turn routed");
        self.event_bus.publish(DomainEvent::RouteDecided {
            thread_id: thread_id.to_string(),
            route,
            timestamp: Utc::now(),
        });

        // ── Handling ──
        self.set_phase(&thread_id, TurnPhase::Handling);
        let ctx = ToolContext::new(thread.id.clone(), thread.user_id.clone());
        let answer = match self.handlers.get(route).run(&thread, &ctx, tx).await {
            Ok(answer) => answer,
            Err(e) => return self.fail(tx, &thread_id, TurnError::Handling(e)).await,
        };

        // ── Appending ──
        self.set_phase(&thread_id, TurnPhase::Appending);
        thread.append(Turn::assistant(&answer));
        thread.route_decision = None;
        if let Err(e) = self.threads.save(&thread).await {
            return self.fail(tx, &thread_id, e.into()).await;
        }

        self.event_bus.publish(DomainEvent::TurnCompleted {
            thread_id: thread_id.to_string(),
            route,
            answer_chars: answer.chars().count(),
            timestamp: Utc::now(),
        });
        let _ = tx.send(TurnEvent::FinalMessage { content: answer }).await;
    }

    /// Report a turn-ending error on the stream and the event bus.
    async fn fail(&self, tx: &mpsc::Sender<TurnEvent>, thread_id: &ThreadId, error: TurnError) {
        warn!(thread_id = %thread_id, code = error.code(), error = %error, "Turn failed");
        self.event_bus.publish(DomainEvent::TurnFailed {
            thread_id: thread_id.to_string(),
            code: error.code().to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        let _ = tx
            .send(TurnEvent::Error {
                error: error.to_string(),
                code: error.code().to_string(),
            })
            .await;
    }
}
