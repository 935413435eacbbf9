use crate::models::Specialization;
use thiserror::Error;

/// Domain errors for the chat subsystem.
///
/// The first four variants are the client-facing taxonomy; everything else is
/// an infrastructure fault surfaced to callers as a generic "unavailable"
/// condition so they can distinguish a bad request from a degraded service.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("no agent available for {specialization}")]
    NoAgentAvailable { specialization: Specialization },

    /// Unknown session id or a caller that fails access validation. The
    /// message never reveals whether the session exists for another owner.
    #[error("session not found or access denied")]
    InvalidSession,

    #[error("session is no longer active")]
    InactiveSession,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A stored enum value that no longer parses (schema drift or a manual
    /// edit). Treated as an infrastructure fault, not a client error.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// Stable machine-readable kind carried on both transport surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::NoAgentAvailable { .. } => "no_agent_available",
            ChatError::InvalidSession => "invalid_session",
            ChatError::InactiveSession => "inactive_session",
            ChatError::MalformedRequest(_) => "malformed_request",
            ChatError::InvalidRecord(_)
            | ChatError::Database(_)
            | ChatError::Config(_)
            | ChatError::Io(_) => "unavailable",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ChatError::NoAgentAvailable { .. }
                | ChatError::InvalidRecord(_)
                | ChatError::Database(_)
                | ChatError::Config(_)
                | ChatError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_kinds_are_stable() {
        let e = ChatError::NoAgentAvailable {
            specialization: Specialization::Treasury,
        };
        assert_eq!(e.kind(), "no_agent_available");
        assert!(e.retryable());

        assert_eq!(ChatError::InvalidSession.kind(), "invalid_session");
        assert!(!ChatError::InvalidSession.retryable());

        assert_eq!(ChatError::InactiveSession.kind(), "inactive_session");
        assert!(!ChatError::InactiveSession.retryable());

        let e = ChatError::MalformedRequest("question is required".into());
        assert_eq!(e.kind(), "malformed_request");
        assert!(!e.retryable());
    }

    #[test]
    fn test_store_faults_map_to_unavailable() {
        let e = ChatError::InvalidRecord("bad status".into());
        assert_eq!(e.kind(), "unavailable");
        assert!(e.retryable());
    }

    #[test]
    fn test_invalid_session_message_does_not_leak() {
        let msg = ChatError::InvalidSession.to_string();
        assert_eq!(msg, "session not found or access denied");
    }
}
