use crate::error::ChatError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Agent,
    System,
    Transfer,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Agent => "agent",
            MessageKind::System => "system",
            MessageKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageKind::User),
            "agent" => Ok(MessageKind::Agent),
            "system" => Ok(MessageKind::System),
            "transfer" => Ok(MessageKind::Transfer),
            other => Err(ChatError::MalformedRequest(format!(
                "unknown message kind: {other}"
            ))),
        }
    }
}

/// Informational metadata attached to generated agent replies. Never feeds
/// back into routing decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReplyMeta {
    pub response_latency_ms: i64,
    pub confidence: f64,
    pub follow_up_required: bool,
}

/// Raw `chat_messages` row as stored. `seq` is a store-assigned insertion
/// counter used as the ordering tiebreak for equal timestamps.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub seq: i64,
    pub kind: String,
    pub sender_user_id: Option<Uuid>,
    pub sender_agent_id: Option<Uuid>,
    pub body: String,
    pub edit_count: i32,
    pub response_latency_ms: Option<i64>,
    pub confidence: Option<f64>,
    pub follow_up_required: Option<bool>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub seq: i64,
    pub kind: MessageKind,
    pub sender_user_id: Option<Uuid>,
    pub sender_agent_id: Option<Uuid>,
    pub body: String,
    pub edit_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_latency_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_required: Option<bool>,
    pub sent_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = ChatError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let kind: MessageKind = row.kind.parse().map_err(|_| {
            ChatError::InvalidRecord(format!(
                "message {} has unknown kind {:?}",
                row.id, row.kind
            ))
        })?;
        Ok(ChatMessage {
            id: row.id,
            session_id: row.session_id,
            seq: row.seq,
            kind,
            sender_user_id: row.sender_user_id,
            sender_agent_id: row.sender_agent_id,
            body: row.body,
            edit_count: row.edit_count,
            response_latency_ms: row.response_latency_ms,
            confidence: row.confidence,
            follow_up_required: row.follow_up_required,
            sent_at: row.sent_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for k in [
            MessageKind::User,
            MessageKind::Agent,
            MessageKind::System,
            MessageKind::Transfer,
        ] {
            assert_eq!(k.as_str().parse::<MessageKind>().unwrap(), k);
        }
        assert!("bot".parse::<MessageKind>().is_err());
    }

    #[test]
    fn test_message_row_rejects_bad_kind() {
        let row = MessageRow {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            seq: 1,
            kind: "note".into(),
            sender_user_id: None,
            sender_agent_id: None,
            body: "hi".into(),
            edit_count: 0,
            response_latency_ms: None,
            confidence: None,
            follow_up_required: None,
            sent_at: Utc::now(),
        };
        assert!(matches!(
            ChatMessage::try_from(row),
            Err(ChatError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_reply_meta_serializes_on_message() {
        let msg = ChatMessage {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            seq: 2,
            kind: MessageKind::Agent,
            sender_user_id: None,
            sender_agent_id: Some(Uuid::new_v4()),
            body: "reply".into(),
            edit_count: 0,
            response_latency_ms: Some(12),
            confidence: Some(0.75),
            follow_up_required: Some(false),
            sent_at: Utc::now(),
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["kind"], "agent");
        assert_eq!(v["response_latency_ms"], 12);
    }
}
