use crate::error::ChatError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Waiting,
    Transferred,
    Ended,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Transferred => "transferred",
            SessionStatus::Ended => "ended",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    /// Ended and abandoned sessions accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Abandoned)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "waiting" => Ok(SessionStatus::Waiting),
            "transferred" => Ok(SessionStatus::Transferred),
            "ended" => Ok(SessionStatus::Ended),
            "abandoned" => Ok(SessionStatus::Abandoned),
            other => Err(ChatError::MalformedRequest(format!(
                "unknown session status: {other}"
            ))),
        }
    }
}

/// Fine-grained classifier label for an inbound question. Mapped onto a
/// `Specialization` for routing; persisted on the session for analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    AccountServices,
    Transfers,
    LoansCredit,
    Investments,
    Cards,
    Compliance,
    Treasury,
    GeneralBanking,
    General,
}

impl TopicCategory {
    pub const ALL: [TopicCategory; 9] = [
        TopicCategory::AccountServices,
        TopicCategory::Transfers,
        TopicCategory::LoansCredit,
        TopicCategory::Investments,
        TopicCategory::Cards,
        TopicCategory::Compliance,
        TopicCategory::Treasury,
        TopicCategory::GeneralBanking,
        TopicCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicCategory::AccountServices => "account_services",
            TopicCategory::Transfers => "transfers",
            TopicCategory::LoansCredit => "loans_credit",
            TopicCategory::Investments => "investments",
            TopicCategory::Cards => "cards",
            TopicCategory::Compliance => "compliance",
            TopicCategory::Treasury => "treasury",
            TopicCategory::GeneralBanking => "general_banking",
            TopicCategory::General => "general",
        }
    }
}

impl FromStr for TopicCategory {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopicCategory::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ChatError::MalformedRequest(format!("unknown topic category: {s}")))
    }
}

/// Who is driving a session: an authenticated user or an anonymous visitor
/// reachable only through the contact blob captured at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerIdentity {
    User(Uuid),
    Anonymous,
}

impl CallerIdentity {
    pub fn from_user_id(user_id: Option<Uuid>) -> Self {
        match user_id {
            Some(id) => CallerIdentity::User(id),
            None => CallerIdentity::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            CallerIdentity::User(id) => Some(*id),
            CallerIdentity::Anonymous => None,
        }
    }
}

/// Raw `chat_sessions` row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub owner_user_id: Option<Uuid>,
    pub contact_info: Option<serde_json::Value>,
    pub agent_id: Uuid,
    pub previous_agent_id: Option<Uuid>,
    pub transfer_reason: Option<String>,
    pub transfer_count: i32,
    pub topic_category: String,
    pub status: String,
    pub message_count: i32,
    pub user_satisfaction: Option<i32>,
    pub feedback: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub owner_user_id: Option<Uuid>,
    pub contact_info: Option<serde_json::Value>,
    pub agent_id: Uuid,
    pub previous_agent_id: Option<Uuid>,
    pub transfer_reason: Option<String>,
    pub transfer_count: i32,
    pub topic_category: TopicCategory,
    pub status: SessionStatus,
    pub message_count: i32,
    pub user_satisfaction: Option<i32>,
    pub feedback: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    pub fn is_anonymous(&self) -> bool {
        self.owner_user_id.is_none()
    }
}

impl TryFrom<SessionRow> for ChatSession {
    type Error = ChatError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status: SessionStatus = row.status.parse().map_err(|_| {
            ChatError::InvalidRecord(format!(
                "session {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;
        let topic_category: TopicCategory = row.topic_category.parse().map_err(|_| {
            ChatError::InvalidRecord(format!(
                "session {} has unknown topic category {:?}",
                row.id, row.topic_category
            ))
        })?;
        Ok(ChatSession {
            id: row.id,
            owner_user_id: row.owner_user_id,
            contact_info: row.contact_info,
            agent_id: row.agent_id,
            previous_agent_id: row.previous_agent_id,
            transfer_reason: row.transfer_reason,
            transfer_count: row.transfer_count,
            topic_category,
            status,
            message_count: row.message_count,
            user_satisfaction: row.user_satisfaction,
            feedback: row.feedback,
            started_at: row.started_at,
            last_activity: row.last_activity,
            ended_at: row.ended_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            SessionStatus::Active,
            SessionStatus::Waiting,
            SessionStatus::Transferred,
            SessionStatus::Ended,
            SessionStatus::Abandoned,
        ] {
            assert_eq!(s.as_str().parse::<SessionStatus>().unwrap(), s);
        }
        assert!("closed".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::Waiting.is_terminal());
        assert!(!SessionStatus::Transferred.is_terminal());
        assert!(SessionStatus::Ended.is_terminal());
        assert!(SessionStatus::Abandoned.is_terminal());
    }

    #[test]
    fn test_topic_category_round_trip() {
        for t in TopicCategory::ALL {
            assert_eq!(t.as_str().parse::<TopicCategory>().unwrap(), t);
        }
        assert!("crypto".parse::<TopicCategory>().is_err());
    }

    #[test]
    fn test_caller_identity() {
        let id = Uuid::new_v4();
        assert_eq!(
            CallerIdentity::from_user_id(Some(id)),
            CallerIdentity::User(id)
        );
        assert_eq!(
            CallerIdentity::from_user_id(None),
            CallerIdentity::Anonymous
        );
        assert_eq!(CallerIdentity::Anonymous.user_id(), None);
    }

    #[test]
    fn test_session_row_rejects_bad_status() {
        let row = SessionRow {
            id: Uuid::new_v4(),
            owner_user_id: None,
            contact_info: Some(serde_json::json!({"email": "a@b.example"})),
            agent_id: Uuid::new_v4(),
            previous_agent_id: None,
            transfer_reason: None,
            transfer_count: 0,
            topic_category: "treasury".into(),
            status: "open".into(),
            message_count: 0,
            user_satisfaction: None,
            feedback: None,
            started_at: Utc::now(),
            last_activity: Utc::now(),
            ended_at: None,
        };
        assert!(matches!(
            ChatSession::try_from(row),
            Err(ChatError::InvalidRecord(_))
        ));
    }
}
