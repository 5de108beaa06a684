use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HelpdeskRequest {
    Ping,
    Health,
    Chat {
        session_id: Option<String>,
        message: Option<String>,
    },
    ListSessions,
    GetSession {
        session_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HelpdeskResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// HTTP-style status code of the failure; absent on success.
    pub code: Option<u16>,
    pub version: String,
}

impl HelpdeskResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            code: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(code: u16, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            code: Some(code),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tagged_by_action() {
        let req: HelpdeskRequest = serde_json::from_value(serde_json::json!({
            "action": "chat",
            "session_id": "s1",
            "message": "hi"
        }))
        .unwrap();
        assert_eq!(
            req,
            HelpdeskRequest::Chat {
                session_id: Some("s1".to_string()),
                message: Some("hi".to_string())
            }
        );

        let list: HelpdeskRequest =
            serde_json::from_value(serde_json::json!({"action": "list_sessions"})).unwrap();
        assert_eq!(list, HelpdeskRequest::ListSessions);
    }

    #[test]
    fn test_chat_fields_may_be_missing() {
        let req: HelpdeskRequest =
            serde_json::from_value(serde_json::json!({"action": "chat"})).unwrap();
        assert_eq!(
            req,
            HelpdeskRequest::Chat {
                session_id: None,
                message: None
            }
        );
    }

    #[test]
    fn test_err_response_carries_code() {
        let resp = HelpdeskResponse::err(404, "Session not found.");
        assert!(!resp.is_ok());
        assert_eq!(resp.code, Some(404));
        assert_eq!(resp.error.as_deref(), Some("Session not found."));
    }
}
