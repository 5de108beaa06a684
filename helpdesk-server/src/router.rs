use helpdesk_core::ipc::{HelpdeskRequest, HelpdeskResponse};
use helpdesk_core::TurnOrchestrator;

pub const SESSION_NOT_FOUND: &str = "Session not found.";
pub const INTERNAL_ERROR: &str = "Internal Server Error";
pub const DB_UNAVAILABLE: &str = "database unavailable";

/// Dispatch one request against the turn orchestrator and its store.
/// Shared by the IPC socket and the HTTP API.
pub async fn handle_request(request: HelpdeskRequest, turns: &TurnOrchestrator) -> HelpdeskResponse {
    match request {
        HelpdeskRequest::Ping => HelpdeskResponse::pong(),
        HelpdeskRequest::Health => match turns.store().health_check().await {
            Ok(version) => HelpdeskResponse::ok(serde_json::json!({
                "status": "ok",
                "sqlite": version,
                "documents": turns.docs().len(),
            })),
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                HelpdeskResponse::err(503, DB_UNAVAILABLE)
            }
        },
        HelpdeskRequest::Chat {
            session_id,
            message,
        } => match turns.handle(session_id.as_deref(), message.as_deref()).await {
            Ok(reply) => match serde_json::to_value(reply) {
                Ok(data) => HelpdeskResponse::ok(data),
                Err(e) => internal(e),
            },
            Err(e) => HelpdeskResponse::err(e.status(), e.to_string()),
        },
        HelpdeskRequest::ListSessions => match turns.store().list_sessions().await {
            Ok(sessions) => match serde_json::to_value(sessions) {
                Ok(data) => HelpdeskResponse::ok(data),
                Err(e) => internal(e),
            },
            Err(e) => internal(e),
        },
        HelpdeskRequest::GetSession { session_id } => {
            match handle_get_session(&session_id, turns).await {
                Ok(Some(data)) => HelpdeskResponse::ok(data),
                Ok(None) => HelpdeskResponse::err(404, SESSION_NOT_FOUND),
                Err(e) => internal(e),
            }
        }
    }
}

/// Session detail: `{sessionId, messages}`, or `None` for an unknown id.
async fn handle_get_session(
    session_id: &str,
    turns: &TurnOrchestrator,
) -> anyhow::Result<Option<serde_json::Value>> {
    if turns.store().get_session(session_id).await?.is_none() {
        return Ok(None);
    }

    let messages = turns.store().get_messages(session_id).await?;
    Ok(Some(serde_json::json!({
        "sessionId": session_id,
        "messages": messages,
    })))
}

fn internal(e: impl std::fmt::Display) -> HelpdeskResponse {
    tracing::error!(error = %e, "Request failed");
    HelpdeskResponse::err(500, INTERNAL_ERROR)
}
