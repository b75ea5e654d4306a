//! Conversation log entries

use crate::llm::LlmMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::llm::MessageRole as Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// The `{role, content}` pair sent to the relay
    pub fn to_llm(&self) -> LlmMessage {
        LlmMessage::new(self.role, self.content.clone())
    }
}
