//! Error types for the gold chat assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Request Validation
    // =============================

    #[error("Validation error: {0}")]
    Validation(String),

    // =============================
    // Agent Errors
    // =============================

    /// No usable agent handle exists for the session.
    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    /// The model or its transport failed while producing an answer.
    #[error("Agent failed: {0}")]
    AgentFailed(String),

    #[error("Agent returned an empty response")]
    EmptyAgentResponse,

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    // =============================
    // Speech Errors
    // =============================

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    // =============================
    // Service Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
