//! API module
//!
//! Contains HTTP request handlers and the router that mounts them

pub mod dashboard;
pub mod gateway;
pub mod ops;

use crate::state::SharedState;
use crate::websocket;
use axum::{
    extract::Request,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Backend liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy"
    pub status: String,
    /// Backend version
    pub version: String,
    /// Human-readable message
    pub message: String,
}

/// GET /healthz - Backend liveness
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Backend is healthy".to_string(),
    })
}

/// Request ID middleware - adds unique ID to each request for tracing
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let response = next.run(request).instrument(span).await;

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

/// Build the application router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        // Dashboard
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/dashboard/refresh", post(dashboard::refresh_dashboard))
        .route("/api/dashboard/stream", get(dashboard::stream_dashboard))
        // Gateway call surface and settings
        .route("/api/gateway/health", get(gateway::gateway_health_call))
        .route("/api/gateway/status", get(gateway::gateway_status))
        .route("/api/gateway/crons", get(gateway::gateway_crons))
        .route(
            "/api/gateway/settings",
            get(gateway::get_settings).put(gateway::update_settings),
        )
        .route("/api/gateway/test", post(gateway::test_connection))
        .route("/api/gateway-health", get(gateway::gateway_reachability))
        .route("/api/gateway-test", get(gateway::gateway_http_test))
        // CLI and workspace pass-through
        .route("/api/health", get(ops::cli_health))
        .route("/api/cron", get(ops::list_crons))
        .route("/api/agents/status", get(ops::agents_status))
        .route("/api/logs", get(ops::logs))
        .route("/api/sessions", get(ops::sessions))
        .route("/api/memory", get(ops::memory))
        // WebSocket for real-time updates
        .route("/ws", get(websocket::websocket_handler))
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
