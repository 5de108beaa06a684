//! Helpdesk HTTP REST API
//!
//! Axum-based HTTP server for chat turns and session history. Runs alongside
//! the Unix socket IPC server (port 3001 by default).
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, Value)`; the inner functions go through the same
//! router as IPC requests. Every failure body is `{error, status}`.
//!
//! Endpoints:
//! - GET  /api/health                    liveness plus store status
//! - POST /api/chat                      run one chat turn
//! - GET  /api/sessions                  list sessions, most recently updated first
//! - GET  /api/sessions/:session_id      full message history of one session
//!
//! `/api/conversations` is an alias of `/api/sessions`.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use helpdesk_core::ipc::{HelpdeskRequest, HelpdeskResponse};
use helpdesk_core::{HelpdeskConfig, TurnOrchestrator};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub turns: TurnOrchestrator,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions", get(list_sessions_handler))
        .route("/api/sessions/:session_id", get(get_session_handler))
        .route("/api/conversations", get(list_sessions_handler))
        .route("/api/conversations/:session_id", get(get_session_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    turns: TurnOrchestrator,
    config: HelpdeskConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { turns });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Helpdesk HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Chat body. Fields stay untyped so a non-string `sessionId` or `message`
/// gets the validation message instead of a deserialization error.
#[derive(Debug, Deserialize, Default)]
pub struct ChatRequest {
    #[serde(rename = "sessionId")]
    pub session_id: Option<serde_json::Value>,
    pub message: Option<serde_json::Value>,
}

pub fn error_body(status: StatusCode, msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": msg.into(),
        "status": status.as_u16(),
    })
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner health check: `{status, timestamp, version, sqlite}`, 503 when the
/// store is unreachable.
pub async fn health_inner(turns: &TurnOrchestrator) -> (StatusCode, serde_json::Value) {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match turns.store().health_check().await {
        Ok(version) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "ok",
                "timestamp": timestamp,
                "version": env!("CARGO_PKG_VERSION"),
                "sqlite": version,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                    "error": crate::router::DB_UNAVAILABLE,
                }),
            )
        }
    }
}

pub async fn chat_inner(turns: &TurnOrchestrator, req: ChatRequest) -> (StatusCode, serde_json::Value) {
    let request = HelpdeskRequest::Chat {
        session_id: req
            .session_id
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string),
        message: req
            .message
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string),
    };
    response_to_http(crate::router::handle_request(request, turns).await)
}

pub async fn list_sessions_inner(turns: &TurnOrchestrator) -> (StatusCode, serde_json::Value) {
    response_to_http(crate::router::handle_request(HelpdeskRequest::ListSessions, turns).await)
}

pub async fn get_session_inner(
    turns: &TurnOrchestrator,
    session_id: String,
) -> (StatusCode, serde_json::Value) {
    let request = HelpdeskRequest::GetSession { session_id };
    response_to_http(crate::router::handle_request(request, turns).await)
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.turns).await;
    (status, Json(body))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => chat_inner(&state.turns, req).await,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Rejected chat body");
            (
                StatusCode::BAD_REQUEST,
                error_body(StatusCode::BAD_REQUEST, "Request body must be a JSON object."),
            )
        }
    };
    (status, Json(body))
}

pub async fn list_sessions_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_sessions_inner(&state.turns).await;
    (status, Json(body))
}

pub async fn get_session_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_session_inner(&state.turns, session_id).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert a router response into an HTTP status and body.
pub fn response_to_http(response: HelpdeskResponse) -> (StatusCode, serde_json::Value) {
    if response.is_ok() {
        return (
            StatusCode::OK,
            response.data.unwrap_or(serde_json::json!({})),
        );
    }

    let status = response
        .code
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let msg = response
        .error
        .unwrap_or_else(|| crate::router::INTERNAL_ERROR.to_string());
    (status, error_body(status, msg))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
