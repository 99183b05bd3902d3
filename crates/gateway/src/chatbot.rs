//! Conversation endpoints.
//!
//! - `POST /chatbot/create-conversation`              Start a thread
//! - `POST /chatbot/stream/{conversation_id}`         Send a message, get SSE stream
//! - `GET  /chatbot/conversations/{conversation_id}`  Thread history and summary

use axum::{
    Router,
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use fbot_agent::Orchestrator;
use fbot_core::error::{StoreError, TurnError};
use fbot_core::thread::{ConversationThread, ThreadId, Turn};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

pub type SharedOrchestrator = Arc<Orchestrator>;

pub fn chatbot_router(orchestrator: SharedOrchestrator) -> Router {
    Router::new()
        .route("/create-conversation", post(create_conversation_handler))
        .route("/stream/{conversation_id}", post(stream_handler))
        .route("/conversations/{conversation_id}", get(get_conversation_handler))
        .with_state(orchestrator)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// An error rejected before any stream is opened.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: message.into(),
                code: "bad_request".into(),
            },
        }
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        let status = match &err {
            TurnError::ConcurrentTurn(_) => StatusCode::CONFLICT,
            TurnError::ThreadNotFound(_) => StatusCode::NOT_FOUND,
            TurnError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            TurnError::Routing(_) | TurnError::Handling(_) => StatusCode::BAD_GATEWAY,
            TurnError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                code: err.code().into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn user_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ── Create ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateConversationResponse {
    pub status: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub message: String,
}

/// `POST /chatbot/create-conversation`. The body is optional; the user id comes
/// from the body, then the `X-User-Id` header, then the configured default.
async fn create_conversation_handler(
    State(orchestrator): State<SharedOrchestrator>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreateConversationResponse>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateConversationRequest::default()
    } else {
        serde_json::from_slice::<CreateConversationRequest>(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?
    };
    let user_id = request.user_id.or_else(|| user_id_from(&headers));

    let thread = orchestrator.create_thread(user_id.as_deref()).await?;
    info!(conversation_id = %thread.id, "Conversation created via API");

    Ok(Json(CreateConversationResponse {
        status: "success".into(),
        conversation_id: thread.id.to_string(),
        created_at: thread.created_at,
        user_id: thread.user_id,
        message: "Created new conversation successfully".into(),
    }))
}

// ── Stream ────────────────────────────────────────────────────────────────

/// The user message, accepted as a form field or a JSON body.
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub query: String,
}

impl<S: Send + Sync> FromRequest<S> for StreamRequest {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let request = if is_json {
            let Json(body) = Json::<StreamRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            body
        } else {
            let axum::Form(body) = axum::Form::<StreamRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            body
        };

        if request.query.trim().is_empty() {
            return Err(ApiError::bad_request("query must not be empty"));
        }
        Ok(request)
    }
}

/// `POST /chatbot/stream/{conversation_id}`: run one turn and stream its
/// `message`, `final_message` and `error` events.
async fn stream_handler(
    State(orchestrator): State<SharedOrchestrator>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    request: StreamRequest,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let thread_id = ThreadId::from(conversation_id);
    let user_id = user_id_from(&headers);
    info!(conversation_id = %thread_id, "Stream request");

    let rx = orchestrator
        .submit_message_for(&thread_id, user_id.as_deref(), request.query)
        .await
        .inspect_err(|e| warn!(conversation_id = %thread_id, error = %e, "Turn rejected"))?;

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ── History ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub user_id: String,
    pub summary: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationThread> for ConversationResponse {
    fn from(thread: ConversationThread) -> Self {
        Self {
            conversation_id: thread.id.to_string(),
            user_id: thread.user_id.clone(),
            summary: thread.running_summary().to_string(),
            turns: thread.turns().to_vec(),
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        }
    }
}

/// `GET /chatbot/conversations/{conversation_id}`
async fn get_conversation_handler(
    State(orchestrator): State<SharedOrchestrator>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let thread = orchestrator.get_thread(&ThreadId::from(conversation_id)).await?;
    Ok(Json(thread.into()))
}
