//! Content-addressed cache of synthesized audio
//!
//! File names derive from a SHA-256 of the language and text, so identical
//! replies share one file and concurrent requests never collide. Writes go
//! through a unique temp file and an atomic rename.

use crate::Result;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable cache key for a piece of speech
    pub fn key_for(language: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(language.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("voice_response_{}", &digest[..32])
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.mp3", key))
    }

    /// Cached bytes for the key, if present
    pub async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => {
                debug!(key = %key, "Audio cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the audio under the key and read it back from disk
    pub async fn store(&self, key: &str, audio: &[u8]) -> Result<Vec<u8>> {
        fs::create_dir_all(&self.dir).await?;

        let final_path = self.path_for(key);
        let temp_path = self.dir.join(format!("{}.{}.tmp", key, Uuid::new_v4()));

        fs::write(&temp_path, audio).await?;
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(path = %final_path.display(), bytes = audio.len(), "Audio cached");
        Ok(fs::read(&final_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_and_language_scoped() {
        let a = AudioCache::key_for("en", "Gold is up today.");
        let b = AudioCache::key_for("en", "Gold is up today.");
        let c = AudioCache::key_for("fr", "Gold is up today.");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("voice_response_"));
        assert_eq!(a.len(), "voice_response_".len() + 32);
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path().join("audio_cache"));
        let key = AudioCache::key_for("en", "hello");

        assert!(cache.load(&key).await.unwrap().is_none());

        let stored = cache.store(&key, b"ID3fake-mp3").await.unwrap();
        assert_eq!(stored, b"ID3fake-mp3");
        assert_eq!(cache.load(&key).await.unwrap().unwrap(), b"ID3fake-mp3");

        // no temp files are left behind
        let mut entries = std::fs::read_dir(cache.dir()).unwrap();
        let only = entries.next().unwrap().unwrap();
        assert!(entries.next().is_none());
        assert_eq!(only.path(), cache.path_for(&key));
    }

    #[tokio::test]
    async fn test_concurrent_stores_of_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path());
        let key = AudioCache::key_for("en", "same text");

        let (a, b) = tokio::join!(cache.store(&key, b"same"), cache.store(&key, b"same"));
        assert_eq!(a.unwrap(), b"same");
        assert_eq!(b.unwrap(), b"same");
    }
}
