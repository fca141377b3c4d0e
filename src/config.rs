use std::path::PathBuf;

use crate::chunker::DEFAULT_MAX_CHUNK_TOKENS;
use crate::generate::RetryPolicy;
use crate::groq;
use crate::loader::DEFAULT_MAX_FILE_BYTES;

pub const API_KEY_VAR: &str = "GROQ_API_KEY";
pub const MAX_FILE_SIZE_VAR: &str = "MAX_FILE_SIZE_MB";
pub const MODEL_VAR: &str = "ARTICLE2HTML_MODEL";
pub const BASE_URL_VAR: &str = "ARTICLE2HTML_BASE_URL";

pub const DEFAULT_WORKERS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GROQ_API_KEY is not set (export it or add it to .env)")]
    MissingApiKey,
    #[error("MAX_FILE_SIZE_MB must be a positive integer number of MiB, got {0:?}")]
    InvalidMaxFileSize(String),
}

/// Settings supplied by the environment (and `.env`, when present).
#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub max_file_bytes: u64,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_file_bytes", &self.max_file_bytes)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => tracing::warn!(error = %err, "failed to load .env"),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup(API_KEY_VAR).filter(|key| !key.trim().is_empty());

        let max_file_bytes = match lookup(MAX_FILE_SIZE_VAR) {
            Some(raw) => parse_max_file_size(&raw)?,
            None => DEFAULT_MAX_FILE_BYTES,
        };

        Ok(Self {
            api_key,
            max_file_bytes,
            model: lookup(MODEL_VAR).unwrap_or_else(|| groq::DEFAULT_MODEL.to_owned()),
            base_url: lookup(BASE_URL_VAR).unwrap_or_else(|| groq::DEFAULT_BASE_URL.to_owned()),
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

fn parse_max_file_size(raw: &str) -> Result<u64, ConfigError> {
    let mib: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidMaxFileSize(raw.to_owned()))?;
    if mib == 0 {
        return Err(ConfigError::InvalidMaxFileSize(raw.to_owned()));
    }
    mib.checked_mul(1024 * 1024)
        .ok_or_else(|| ConfigError::InvalidMaxFileSize(raw.to_owned()))
}

/// Knobs of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub max_chunk_tokens: usize,
    pub max_file_bytes: u64,
    pub retry: RetryPolicy,
    pub cache_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_chunk_tokens: DEFAULT_MAX_CHUNK_TOKENS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            retry: RetryPolicy::default(),
            cache_dir: default_cache_dir(),
        }
    }
}

pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("article2html").join("cache")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_env() -> anyhow::Result<()> {
        let config = Config::from_lookup(lookup(&[]))?;
        assert_eq!(config.api_key, None);
        assert_eq!(config.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(config.model, groq::DEFAULT_MODEL);
        assert_eq!(config.base_url, groq::DEFAULT_BASE_URL);
        assert!(matches!(
            config.require_api_key(),
            Err(ConfigError::MissingApiKey)
        ));
        Ok(())
    }

    #[test]
    fn env_overrides_are_read() -> anyhow::Result<()> {
        let config = Config::from_lookup(lookup(&[
            (API_KEY_VAR, "gsk_test"),
            (MAX_FILE_SIZE_VAR, " 2 "),
            (MODEL_VAR, "llama-3.3-70b-versatile"),
        ]))?;
        assert_eq!(config.require_api_key()?, "gsk_test");
        assert_eq!(config.max_file_bytes, 2 * 1024 * 1024);
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        Ok(())
    }

    #[test]
    fn blank_api_key_counts_as_missing() -> anyhow::Result<()> {
        let config = Config::from_lookup(lookup(&[(API_KEY_VAR, "  ")]))?;
        assert!(config.require_api_key().is_err());
        Ok(())
    }

    #[test]
    fn invalid_max_file_size_is_rejected() {
        for raw in ["ten", "0", "-1"] {
            let result = Config::from_lookup(lookup(&[(MAX_FILE_SIZE_VAR, raw)]));
            assert!(
                matches!(result, Err(ConfigError::InvalidMaxFileSize(_))),
                "raw={raw}"
            );
        }
    }

    #[test]
    fn debug_redacts_api_key() -> anyhow::Result<()> {
        let config = Config::from_lookup(lookup(&[(API_KEY_VAR, "gsk_secret")]))?;
        let debug = format!("{config:?}");
        assert!(!debug.contains("gsk_secret"));
        assert!(debug.contains("<redacted>"));
        Ok(())
    }
}
