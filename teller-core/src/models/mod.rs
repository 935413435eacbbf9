pub mod agent;
pub mod message;
pub mod session;

pub use agent::{AccountTier, Agent, AgentRow, Specialization};
pub use message::{ChatMessage, MessageKind, MessageRow, ReplyMeta};
pub use session::{CallerIdentity, ChatSession, SessionRow, SessionStatus, TopicCategory};
