//! Service configuration loaded from environment variables.
//!
//! `.env` is loaded by the binary before [`AppConfig::from_env`] runs.
//! A missing model API key is not an error here: agent initialization
//! fails later and the service answers with canned replies.

use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::error::AssistantError;
use crate::gemini::DEFAULT_GEMINI_MODEL;
use crate::models::DEFAULT_USER_ID;
use crate::speech::stt::{DEFAULT_WHISPER_API_URL, DEFAULT_WHISPER_MODEL};
use crate::state::{SessionConfig, DEFAULT_IDLE_TTL_SECS, DEFAULT_MAX_SESSIONS};
use crate::Result;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_PORT: u16 = 8080;

/// Longest accepted idle TTL (30 days).
pub const MAX_IDLE_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    pub audio_cache_dir: PathBuf,
    pub static_dir: PathBuf,
    pub whisper_api_url: String,
    pub whisper_api_key: String,
    pub whisper_model: String,
    pub tts_language: String,
    pub agent_max_iterations: usize,
    pub session_idle_ttl_secs: i64,
    pub max_sessions: usize,
    pub default_user_id: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT").or_else(|| var("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let agent_max_iterations: usize =
            parse_or("AGENT_MAX_ITERATIONS", var("AGENT_MAX_ITERATIONS"), DEFAULT_MAX_ITERATIONS)?;
        if agent_max_iterations == 0 {
            return Err(AssistantError::Config(
                "AGENT_MAX_ITERATIONS must be at least 1".to_string(),
            ));
        }

        let session_idle_ttl_secs: i64 =
            parse_or("SESSION_IDLE_TTL_SECS", var("SESSION_IDLE_TTL_SECS"), DEFAULT_IDLE_TTL_SECS)?;
        if !(1..=MAX_IDLE_TTL_SECS).contains(&session_idle_ttl_secs) {
            return Err(AssistantError::Config(format!(
                "SESSION_IDLE_TTL_SECS must be between 1 and {}",
                MAX_IDLE_TTL_SECS
            )));
        }

        let max_sessions: usize = parse_or("MAX_SESSIONS", var("MAX_SESSIONS"), DEFAULT_MAX_SESSIONS)?;
        if max_sessions == 0 {
            return Err(AssistantError::Config("MAX_SESSIONS must be at least 1".to_string()));
        }

        Ok(Self {
            gemini_api_key: var("GEMINI_API_KEY")
                .or_else(|| var("GOOGLE_API_KEY"))
                .unwrap_or_default(),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            port,
            audio_cache_dir: var("AUDIO_CACHE_DIR")
                .unwrap_or_else(|| "audio_cache".to_string())
                .into(),
            static_dir: var("STATIC_DIR").unwrap_or_else(|| "static".to_string()).into(),
            whisper_api_url: var("WHISPER_API_URL")
                .unwrap_or_else(|| DEFAULT_WHISPER_API_URL.to_string()),
            whisper_api_key: var("WHISPER_API_KEY").unwrap_or_default(),
            whisper_model: var("WHISPER_MODEL").unwrap_or_else(|| DEFAULT_WHISPER_MODEL.to_string()),
            tts_language: var("TTS_LANGUAGE").unwrap_or_else(|| "en".to_string()),
            agent_max_iterations,
            session_idle_ttl_secs,
            max_sessions,
            default_user_id: var("DEFAULT_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_ttl: chrono::Duration::seconds(self.session_idle_ttl_secs),
            max_sessions: self.max_sessions,
        }
    }

    pub fn has_gemini_key(&self) -> bool {
        !self.gemini_api_key.is_empty()
    }
}

// Keys stay out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("port", &self.port)
            .field("audio_cache_dir", &self.audio_cache_dir)
            .field("static_dir", &self.static_dir)
            .field("whisper_api_url", &self.whisper_api_url)
            .field("whisper_api_key", &redact(&self.whisper_api_key))
            .field("whisper_model", &self.whisper_model)
            .field("tts_language", &self.tts_language)
            .field("agent_max_iterations", &self.agent_max_iterations)
            .field("session_idle_ttl_secs", &self.session_idle_ttl_secs)
            .field("max_sessions", &self.max_sessions)
            .field("default_user_id", &self.default_user_id)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AssistantError::Config(format!("{} has an invalid value: {:?}", key, raw)))
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(load(&[]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.audio_cache_dir, PathBuf::from("audio_cache"));
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.whisper_model, "whisper-large-v3-turbo");
        assert_eq!(config.tts_language, "en");
        assert_eq!(config.agent_max_iterations, 2);
        assert_eq!(config.session_idle_ttl_secs, 3600);
        assert_eq!(config.max_sessions, 1000);
        assert_eq!(config.default_user_id, "random_user");
        assert!(!config.has_gemini_key());
    }

    #[test]
    fn test_overrides_and_fallback_keys() {
        let config = assert_ok!(load(&[
            ("GOOGLE_API_KEY", "g-key"),
            ("API_PORT", "9000"),
            ("MAX_SESSIONS", "5"),
            ("AGENT_MAX_ITERATIONS", "4"),
        ]));
        assert_eq!(config.gemini_api_key, "g-key");
        assert_eq!(config.port, 9000);
        assert_eq!(config.session_config().max_sessions, 5);
        assert_eq!(config.agent_max_iterations, 4);

        let config = assert_ok!(load(&[
            ("GEMINI_API_KEY", "primary"),
            ("GOOGLE_API_KEY", "secondary"),
            ("PORT", "7000"),
            ("API_PORT", "9000"),
        ]));
        assert_eq!(config.gemini_api_key, "primary");
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_invalid_numbers_are_config_errors() {
        assert_err!(load(&[("PORT", "eighty")]));
        assert_err!(load(&[("MAX_SESSIONS", "0")]));
        assert_err!(load(&[("SESSION_IDLE_TTL_SECS", "-5")]));
        assert_err!(load(&[("SESSION_IDLE_TTL_SECS", "9223372036854775807")]));
        assert_err!(load(&[("SESSION_IDLE_TTL_SECS", "2592001")]));

        let err = load(&[("AGENT_MAX_ITERATIONS", "many")]).unwrap_err();
        assert!(matches!(err, AssistantError::Config(_)));
        assert!(err.to_string().contains("AGENT_MAX_ITERATIONS"));
    }

    #[test]
    fn test_longest_ttl_builds_session_config() {
        let config = assert_ok!(load(&[("SESSION_IDLE_TTL_SECS", "2592000")]));
        assert_eq!(config.session_config().idle_ttl, chrono::Duration::days(30));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = assert_ok!(load(&[("GEMINI_API_KEY", "super-secret")]));
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
