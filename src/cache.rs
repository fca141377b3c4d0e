use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Digest as _;

const RECORD_EXTENSION: &str = "json";

/// 128-bit content hash of a fully assembled prompt, hex encoded.
pub fn prompt_key(prompt: &str) -> String {
    let digest = sha2::Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..16])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// Session-scoped response store: one JSON record per prompt key, wiped
/// when the cache is opened. IO failures degrade to cache misses.
#[derive(Debug)]
pub struct ResponseCache {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl ResponseCache {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create cache dir: {}", dir.display()))?;

        let cache = Self {
            dir,
            lock: Mutex::new(()),
        };
        cache.clear();
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    pub fn get(&self, prompt: &str) -> Option<String> {
        let key = prompt_key(prompt);
        let path = self.record_path(&key);

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !path.exists() {
            return None;
        }

        match read_entry(&path) {
            Ok(entry) => {
                tracing::debug!(key = %key, "cache hit");
                Some(entry.response)
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %format!("{err:#}"), "cache read failed");
                None
            }
        }
    }

    pub fn set(&self, prompt: &str, response: &str) {
        let key = prompt_key(prompt);
        let path = self.record_path(&key);
        let entry = CacheEntry {
            prompt: prompt.to_owned(),
            response: response.to_owned(),
            created_at: Utc::now(),
        };

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match write_entry(&path, &entry) {
            Ok(()) => tracing::debug!(key = %key, "cache store"),
            Err(err) => {
                tracing::warn!(key = %key, error = %format!("{err:#}"), "cache write failed")
            }
        }
    }

    /// Removes every cache record in the directory.
    pub fn clear(&self) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(dir = %self.dir.display(), error = %err, "cache clear failed");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Err(err) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %err, "remove cache record failed");
            }
        }
    }
}

fn read_entry(path: &Path) -> anyhow::Result<CacheEntry> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read cache record: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse cache record: {}", path.display()))
}

fn write_entry(path: &Path, entry: &CacheEntry) -> anyhow::Result<()> {
    let json = serde_json::to_string(entry).context("serialize cache record")?;
    std::fs::write(path, json).with_context(|| format!("write cache record: {}", path.display()))
}
