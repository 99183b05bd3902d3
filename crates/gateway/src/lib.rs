//! HTTP gateway for FBot.
//!
//! Exposes the health check and the `/chatbot` conversation API, streaming
//! each turn back as server-sent events.
//!
//! Built on Axum.

pub mod bootstrap;
pub mod chatbot;

#[cfg(test)]
mod test_support;

pub use bootstrap::build_orchestrator;
pub use chatbot::{SharedOrchestrator, chatbot_router};

use axum::{Router, http::Method, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Startup failures: configuration, stores, knowledge loading or binding.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Build the full router: `/health` plus the conversation API under `/chatbot`.
pub fn build_router(orchestrator: SharedOrchestrator) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/chatbot", chatbot_router(orchestrator))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Serve an already-built orchestrator until the process is stopped.
pub async fn serve(orchestrator: SharedOrchestrator, addr: &str) -> Result<(), BoxError> {
    let app = build_router(orchestrator);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the gateway HTTP server from configuration.
pub async fn start(config: fbot_config::AppConfig) -> Result<(), BoxError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let orchestrator = build_orchestrator(&config).await?;
    serve(orchestrator, &addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::echo_orchestrator;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(echo_orchestrator());

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn chatbot_routes_are_nested() {
        let app = build_router(echo_orchestrator());

        let req = Request::builder()
            .method("POST")
            .uri("/chatbot/create-conversation")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/create-conversation")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let app = build_router(echo_orchestrator());

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chatbot/create-conversation")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = build_router(echo_orchestrator());
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
