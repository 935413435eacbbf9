use crate::error::ChatError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Requests on the Unix-socket event surface. Mirrors the HTTP operations
/// one-for-one; specialization and tier arrive as storage strings and are
/// parsed at the router boundary.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatRequest {
    Ping,
    Health,
    StartSession {
        user_id: Option<Uuid>,
        contact: Option<serde_json::Value>,
        specialization: Option<String>,
        question: String,
        #[serde(default)]
        queue: bool,
    },
    SendMessage {
        session_id: Uuid,
        user_id: Option<Uuid>,
        text: String,
    },
    Transfer {
        session_id: Uuid,
        user_id: Option<Uuid>,
        specialization: String,
        reason: String,
    },
    EndSession {
        session_id: Uuid,
        user_id: Option<Uuid>,
        rating: Option<i32>,
        feedback: Option<String>,
    },
    History {
        session_id: Uuid,
        user_id: Option<Uuid>,
    },
    ListAgents {
        tier: Option<String>,
    },
    /// Manual trigger for the background sweep cycle.
    Sweep,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    pub version: String,
}

impl ChatResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            error_kind: None,
            retryable: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Transport-level failure (e.g. a frame that does not decode).
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: Some("malformed_request".to_string()),
            retryable: Some(false),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Domain failure carrying the error taxonomy kind.
    pub fn domain_err(e: &ChatError) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(e.to_string()),
            error_kind: Some(e.kind().to_string()),
            retryable: Some(e.retryable()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_action_tagging() {
        let req = ChatRequest::SendMessage {
            session_id: Uuid::new_v4(),
            user_id: None,
            text: "hello".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["action"], "send_message");
        assert_eq!(v["text"], "hello");
    }

    #[test]
    fn test_queue_flag_defaults_false() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "action": "start_session",
            "user_id": null,
            "contact": {"email": "a@b.example"},
            "specialization": null,
            "question": "I need a loan"
        }))
        .unwrap();
        match req {
            ChatRequest::StartSession { queue, .. } => assert!(!queue),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_domain_err_carries_kind() {
        let resp = ChatResponse::domain_err(&ChatError::InactiveSession);
        assert_eq!(resp.status, "error");
        assert_eq!(resp.error_kind.as_deref(), Some("inactive_session"));
        assert_eq!(resp.retryable, Some(false));
    }

    #[test]
    fn test_response_round_trips_messagepack() {
        let resp = ChatResponse::ok(serde_json::json!({"session_id": "abc"}));
        let bytes = rmp_serde::to_vec_named(&resp).unwrap();
        let back: ChatResponse = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back.status, "ok");
        assert_eq!(back.data.unwrap()["session_id"], "abc");
    }
}
