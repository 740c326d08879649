//! Gold Chat Assistant
//!
//! A web chat assistant for gold and personal-finance questions:
//! - Text and voice chat over HTTP, with a small browser UI
//! - Per-user agent sessions backed by Gemini with a web search tool
//! - Gold keyword detection driving the digital-gold call to action
//! - Canned replies whenever the agent cannot answer
//!
//! REQUEST FLOW:
//! INPUT → VALIDATE → (TRANSCRIBE) → DETECT GOLD → AGENT / FALLBACK → (SYNTHESIZE) → RESPOND

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod conversational;
pub mod error;
pub mod gemini;
pub mod market;
pub mod memory;
pub mod models;
pub mod pages;
pub mod responses;
pub mod speech;
pub mod state;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use classifier::GoldClassifier;
pub use config::AppConfig;
pub use conversational::{ChatService, ConversationalReply, ReplySource};
pub use models::*;
