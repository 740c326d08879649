//! Agent Memory
//!
//! Append-only conversation buffer that lets the agent remember earlier
//! turns of the same session. Held in-process and lost on restart.

pub mod store;

pub use store::{ConversationHistory, ConversationMessage, MessageRole};
