//! Conversation buffer storage
//!
//! Stores the messages of one session with timestamps and metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

/// A single message in the conversation buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
    /// Approximate token count, for logging prompt growth
    pub token_count: usize,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: String) -> Self {
        let token_count = (content.len() + 3) / 4;

        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
            token_count,
        }
    }
}

/// Append-only conversation history for a user session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    messages: Vec<ConversationMessage>,
    total_tokens: usize,
}

impl ConversationHistory {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: Vec::new(),
            total_tokens: 0,
        }
    }

    /// Add a message to history
    pub fn add_message(&mut self, message: ConversationMessage) {
        self.total_tokens += message.token_count;
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Record one completed turn: the user input followed by the agent output
    pub fn add_exchange(&mut self, input: &str, output: &str) {
        self.add_message(ConversationMessage::new(MessageRole::User, input.to_string()));
        self.add_message(ConversationMessage::new(MessageRole::Agent, output.to_string()));
    }

    /// Iterate over all messages, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    pub fn last_message(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
