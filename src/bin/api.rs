use gold_chat_assistant::{
    agent::AgentGateway,
    api::{create_router, start_server, ApiState},
    config::AppConfig,
    conversational::ChatService,
    gemini::GeminiClient,
    pages::Pages,
    speech::{AudioCache, GoogleTranslateTts, WhisperApiTranscriber},
    state::SessionStore,
    tools::create_default_registry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle sessions are swept.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    if !config.has_gemini_key() {
        warn!("GEMINI_API_KEY not set; chat will answer with canned replies");
        warn!("See .env.example for setup instructions");
    }

    info!("Gold Chat Assistant - API Server");
    info!(port = config.port, model = %config.gemini_model, "Configuration loaded");

    // Agent components
    let model = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    )?);
    let registry = Arc::new(create_default_registry()?);
    let gateway = Arc::new(
        AgentGateway::new(model, registry).with_max_iterations(config.agent_max_iterations),
    );
    let sessions = Arc::new(SessionStore::new(config.session_config()));
    let chat = Arc::new(ChatService::new(gateway, sessions.clone()));

    let session = chat.register_user(&config.default_user_id).await;
    info!(
        user_id = %config.default_user_id,
        ready = session.is_ready(),
        "Default session initialized"
    );

    // Idle session sweep
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            ticker.tick().await;
            sessions.evict_idle().await;
        }
    });

    // Speech adapters
    let transcriber = Arc::new(WhisperApiTranscriber::new(
        config.whisper_api_url.clone(),
        config.whisper_api_key.clone(),
        config.whisper_model.clone(),
    )?);
    let synthesizer = Arc::new(GoogleTranslateTts::new(
        config.tts_language.clone(),
        AudioCache::new(config.audio_cache_dir.clone()),
    )?);

    let state = ApiState {
        chat,
        transcriber,
        synthesizer,
        pages: Arc::new(Pages::new()?),
    };

    info!("Starting API server...");
    start_server(create_router(state, &config.static_dir), config.port).await?;

    Ok(())
}
