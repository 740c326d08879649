//! Core data models for the chat assistant

use crate::error::AssistantError;
use crate::Result;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// User id assumed when a request does not name one.
pub const DEFAULT_USER_ID: &str = "random_user";

//
// ================= Chat =================
//

/// Inbound text message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Session to route the message to; the default user when absent.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub timestamp: String,
    pub message_id: String,
    #[serde(default)]
    pub contains_gold: bool,
}

impl ChatResponse {
    pub fn new(text: String, contains_gold: bool) -> Self {
        Self {
            text,
            timestamp: now_iso(),
            message_id: random_message_id(),
            contains_gold,
        }
    }
}

/// Reply to a voice message, in the shape the browser client plays back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceChatResponse {
    /// Base64-encoded MP3.
    pub audio_response: String,
    pub bot_response: String,
    pub timestamp: String,
    pub contains_gold: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameForm {
    pub name: String,
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

//
// ================= Helpers =================
//

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// `msg_NNNN` with a four digit random suffix. Not unique.
pub fn random_message_id() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("msg_{}", suffix)
}

/// Resolve the session key for a request, falling back to the default user.
pub fn resolve_user_id(user_id: Option<&str>) -> String {
    match user_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => DEFAULT_USER_ID.to_string(),
    }
}

/// Trimmed `value`, or a validation error carrying `message` when it is blank.
pub fn require_non_blank<'a>(value: &'a str, message: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AssistantError::Validation(message.to_string()));
    }
    Ok(trimmed)
}
