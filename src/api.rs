//! REST API server for the gold chat assistant
//!
//! Serves the web UI pages, the text and voice chat endpoints and a few
//! auxiliary JSON endpoints.

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::Path as FsPath;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::conversational::ChatService;
use crate::error::AssistantError;
use crate::market::MarketSnapshot;
use crate::models::{
    now_iso, require_non_blank, resolve_user_id, ChatMessage, ChatResponse, NameForm,
    VoiceChatResponse,
};
use crate::pages::Pages;
use crate::speech::stt::MAX_STT_INPUT_BYTES;
use crate::speech::{SpeechToText, TextToSpeech};

pub const API_VERSION: &str = "1.0.0";
pub const FEATURES: &[&str] = &["text_chat", "voice_chat", "gold_detection", "investment_guidance"];

/// Upper bound on voice uploads, slightly above the transcription limit.
const MAX_UPLOAD_BYTES: usize = 26 * 1024 * 1024;

/// =============================
/// Errors
/// =============================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        match e {
            AssistantError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub chat: Arc<ChatService>,
    pub transcriber: Arc<dyn SpeechToText>,
    pub synthesizer: Arc<dyn TextToSpeech>,
    pub pages: Arc<Pages>,
}

/// =============================
/// Pages
/// =============================

async fn welcome_page(State(state): State<ApiState>) -> Result<Html<String>, ApiError> {
    Ok(Html(state.pages.render_welcome()?))
}

async fn send_name(
    State(state): State<ApiState>,
    form: Result<Form<NameForm>, FormRejection>,
) -> Result<Html<String>, ApiError> {
    let Form(form) = form?;
    let name = require_non_blank(&form.name, "Name cannot be empty")?;

    let session = state.chat.register_user(name).await;
    info!(user_id = %name, ready = session.is_ready(), "User registered from welcome page");

    Ok(Html(state.pages.render_chat(name)?))
}

async fn digital_gold_page(State(state): State<ApiState>) -> Result<Html<String>, ApiError> {
    Ok(Html(state.pages.render_digital_gold()?))
}

/// =============================
/// Chat Endpoints
/// =============================

async fn send_text_message(
    State(state): State<ApiState>,
    payload: Result<Json<ChatMessage>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(message) = payload?;
    require_non_blank(&message.text, "Message text cannot be empty")?;

    let user_id = resolve_user_id(message.user_id.as_deref());
    info!(user_id = %user_id, chars = message.text.len(), "Received text message");

    let reply = state.chat.generate_response(&user_id, &message.text).await;
    if reply.text.trim().is_empty() {
        error!(user_id = %user_id, "Reply text was empty");
        return Err(ApiError::Internal(
            "Error processing message: empty reply".to_string(),
        ));
    }

    Ok(Json(ChatResponse::new(reply.text, reply.contains_gold)))
}

/// Parts of a voice upload
struct VoiceUpload {
    audio: Vec<u8>,
    content_type: String,
    user_id: Option<String>,
}

async fn read_voice_upload(mut multipart: Multipart) -> Result<VoiceUpload, ApiError> {
    let mut audio = None;
    let mut user_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !content_type.starts_with("audio/") {
                    return Err(ApiError::BadRequest("File must be an audio file".to_string()));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid audio upload: {}", e)))?;
                if bytes.len() > MAX_STT_INPUT_BYTES {
                    return Err(ApiError::BadRequest(format!(
                        "Audio file is too large: {} bytes (limit: {} bytes)",
                        bytes.len(),
                        MAX_STT_INPUT_BYTES
                    )));
                }
                audio = Some((bytes.to_vec(), content_type));
            }
            Some("user_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid user_id field: {}", e)))?;
                user_id = Some(value);
            }
            _ => {}
        }
    }

    let Some((audio, content_type)) = audio else {
        return Err(ApiError::BadRequest("Missing audio file".to_string()));
    };

    Ok(VoiceUpload {
        audio,
        content_type,
        user_id,
    })
}

async fn send_voice_message(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<Json<VoiceChatResponse>, ApiError> {
    let upload = read_voice_upload(multipart).await?;
    let user_id = resolve_user_id(upload.user_id.as_deref());
    info!(
        user_id = %user_id,
        bytes = upload.audio.len(),
        content_type = %upload.content_type,
        "Received voice message"
    );

    let voice_error = |e: AssistantError| {
        error!(user_id = %user_id, error = %e, "Voice message failed");
        ApiError::Internal(format!("Error processing voice message: {}", e))
    };

    let transcript = state
        .transcriber
        .transcribe(&upload.audio, &upload.content_type)
        .await
        .map_err(voice_error)?;
    if let Err(e) = require_non_blank(
        &transcript,
        "Could not understand the audio, transcription was empty",
    ) {
        warn!(user_id = %user_id, "Transcription produced no text");
        return Err(e.into());
    }

    let reply = state.chat.generate_response(&user_id, &transcript).await;
    let audio = state
        .synthesizer
        .synthesize(&reply.text)
        .await
        .map_err(voice_error)?;

    Ok(Json(VoiceChatResponse {
        audio_response: BASE64.encode(audio),
        bot_response: reply.text,
        timestamp: now_iso(),
        contains_gold: reply.contains_gold,
    }))
}

/// =============================
/// Auxiliary Endpoints
/// =============================

async fn audio_placeholder(Path(audio_id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "audio_id": audio_id,
        "status": "Audio file would be served here",
        "note": "This is a placeholder endpoint",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": now_iso(),
        "version": API_VERSION,
        "features": FEATURES,
    }))
}

async fn gold_market_info() -> Json<MarketSnapshot> {
    Json(MarketSnapshot::simulate())
}

async fn not_found(uri: Uri) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Endpoint not found",
            "path": uri.path(),
        })),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState, static_dir: impl AsRef<FsPath>) -> Router {
    Router::new()
        .route("/", get(welcome_page))
        .route("/send_name", post(send_name))
        .route("/api/send-text-message", post(send_text_message))
        .route(
            "/api/send-voice-message",
            post(send_voice_message).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/buy-digital-gold", get(digital_gold_page))
        .route("/api/audio/:audio_id", get(audio_placeholder))
        .route("/api/health", get(health))
        .route("/api/gold-market-info", get(gold_market_info))
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(router: Router, port: u16) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_map_to_bad_request() {
        let api: ApiError = AssistantError::Validation("bad".to_string()).into();
        assert!(matches!(api, ApiError::BadRequest(_)));

        let api: ApiError = AssistantError::Tts("No text to speak".to_string()).into();
        assert_eq!(api.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
