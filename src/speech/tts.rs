use super::{AudioCache, TextToSpeech};
use crate::error::AssistantError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Longest text the endpoint accepts per request, in characters.
pub const MAX_CHUNK_CHARS: usize = 100;

/// Google Translate speech endpoint, with on-disk caching
pub struct GoogleTranslateTts {
    client: Client,
    url: String,
    language: String,
    cache: AudioCache,
}

impl GoogleTranslateTts {
    pub fn new(language: impl Into<String>, cache: AudioCache) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64)")
            .build()?;

        Ok(Self {
            client,
            url: DEFAULT_TTS_URL.to_string(),
            language: language.into(),
            cache,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn fetch(&self, text: &str) -> Result<Vec<u8>> {
        let chunks = split_for_tts(text, MAX_CHUNK_CHARS);
        let total = chunks.len().to_string();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&self.url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", self.language.as_str()),
                    ("ttsspeed", "1"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                    ("client", "tw-ob"),
                ])
                .send()
                .await
                .map_err(|e| AssistantError::Tts(format!("TTS request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                error!(%status, chunk = %idx, "TTS endpoint returned an error");
                return Err(AssistantError::Tts(format!(
                    "TTS endpoint returned {} for chunk {}",
                    status, idx
                )));
            }

            audio.extend_from_slice(&response.bytes().await?);
        }

        debug!(chunks = chunks.len(), bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }
}

#[async_trait]
impl TextToSpeech for GoogleTranslateTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::Tts("No text to speak".to_string()));
        }

        let key = AudioCache::key_for(&self.language, text);
        if let Some(audio) = self.cache.load(&key).await? {
            return Ok(audio);
        }

        let audio = self.fetch(text).await?;
        self.cache.store(&key, &audio).await
    }
}

/// Split text into chunks of at most `max_chars` characters.
///
/// Breaks at sentence punctuation followed by whitespace, then at
/// whitespace; only words longer than the limit are cut mid-word.
/// Adjacent pieces are packed together while they fit.
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);

    let mut pieces: Vec<String> = Vec::new();
    for sentence in sentence_pieces(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if sentence.chars().count() <= max_chars {
            pieces.push(sentence.to_string());
            continue;
        }
        for word in sentence.split_whitespace() {
            if word.chars().count() <= max_chars {
                pieces.push(word.to_string());
            } else {
                let chars: Vec<char> = word.chars().collect();
                pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            }
        }
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for piece in pieces {
        let len = piece.chars().count();
        if current.is_empty() {
            current = piece;
            current_len = len;
        } else if current_len + 1 + len <= max_chars {
            current.push(' ');
            current.push_str(&piece);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current = piece;
            current_len = len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn sentence_pieces(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = c == '\n'
            || (matches!(c, '.' | '!' | '?' | ';' | ':' | ',')
                && chars.peek().map_or(true, |(_, next)| next.is_whitespace()));
        if boundary {
            let end = i + c.len_utf8();
            pieces.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}
