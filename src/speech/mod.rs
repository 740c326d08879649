//! Speech adapters
//!
//! - [`SpeechToText`]: uploaded audio → transcript (hosted Whisper)
//! - [`TextToSpeech`]: reply text → MP3 bytes (Google Translate TTS)
//!
//! Both engines are external services; this module only speaks their
//! HTTP APIs and caches synthesized audio on disk.

pub mod cache;
pub mod stt;
pub mod tts;

use crate::Result;
use async_trait::async_trait;

pub use cache::AudioCache;
pub use stt::WhisperApiTranscriber;
pub use tts::GoogleTranslateTts;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an uploaded clip; `content_type` is the upload's MIME type
    async fn transcribe(&self, audio: &[u8], content_type: &str) -> Result<String>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize speech, returning MP3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
