pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod models;
pub mod routing;

pub use config::TellerConfig;
pub use error::{ChatError, ChatResult};
pub use models::{
    AccountTier, Agent, CallerIdentity, ChatMessage, ChatSession, MessageKind, SessionStatus,
    Specialization, TopicCategory,
};
pub use routing::{CannedResponder, ResponseGenerator};
