use super::SpeechToText;
use crate::error::AssistantError;
use crate::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_WHISPER_API_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-large-v3-turbo";

/// Transcription language is pinned to English.
const TRANSCRIPTION_LANGUAGE: &str = "en";

/// Maximum upload accepted by hosted Whisper endpoints (25 MiB).
pub const MAX_STT_INPUT_BYTES: usize = 25 * 1024 * 1024;

/// Transcriber for any OpenAI-compatible `/audio/transcriptions` endpoint
pub struct WhisperApiTranscriber {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperApiTranscriber {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperApiTranscriber {
    async fn transcribe(&self, audio: &[u8], content_type: &str) -> Result<String> {
        if audio.is_empty() {
            return Err(AssistantError::Stt("audio data is empty".to_string()));
        }
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(AssistantError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }
        if self.api_key.is_empty() {
            return Err(AssistantError::Stt("WHISPER_API_KEY not configured".to_string()));
        }

        let mime = base_mime(content_type);
        let file = Part::bytes(audio.to_vec())
            .file_name(format!("audio.{}", extension_for(mime)))
            .mime_str(mime)
            .map_err(|e| AssistantError::Stt(format!("Invalid audio content type: {}", e)))?;

        let form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", TRANSCRIPTION_LANGUAGE)
            .text("response_format", "json");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AssistantError::Stt(format!("Transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Transcription API error response: {}", body);
            return Err(AssistantError::Stt(format!(
                "Transcription API error ({}): {}",
                status, body
            )));
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Stt(format!("Invalid transcription response: {}", e)))?;

        let text = transcription.text.trim().to_string();
        info!(bytes = audio.len(), chars = text.len(), "Audio transcribed");
        Ok(text)
    }
}

/// MIME type without parameters, e.g. `audio/webm;codecs=opus` → `audio/webm`
fn base_mime(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or(content_type).trim()
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => "webm",
    }
}
