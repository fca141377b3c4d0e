use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng as _;

use crate::classify::{ApiError, classify};
use crate::html::{self, ValidationError};
use crate::model::LanguageModel;

pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_secs(2);

const ARTICLE_OPEN: &str = "<article";
const ARTICLE_CLOSE: &str = "</article>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// `base_delay * 2^attempt`, before jitter.
    pub fn base_backoff(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
        self.base_delay.saturating_mul(factor)
    }

    /// Wait before the next attempt: the server hint when there is one,
    /// otherwise exponential backoff plus uniform jitter in `[0, max_jitter)`.
    pub fn delay(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        if let Some(retry_after) = retry_after {
            return retry_after;
        }
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            let secs = rand::thread_rng().gen_range(0.0..self.max_jitter.as_secs_f64());
            Duration::from_secs_f64(secs)
        };
        self.base_backoff(attempt) + jitter
    }
}

#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("no <article> tag in model response")]
    MissingArticleStart,
    #[error("no closing </article> tag in model response")]
    MissingArticleEnd,
}

/// Optional hint rendered after a terminal API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guidance(pub Option<&'static str>);

impl fmt::Display for Guidance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(text) => write!(f, " ({text})"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerateError {
    #[error("malformed model output: {0}")]
    Malformed(#[from] ExtractError),
    #[error("generated html failed validation: {0}")]
    Validation(#[from] ValidationError),
    #[error(
        "model call failed after {attempts}/{max_attempts} attempt(s): {} - {}{guidance}",
        .error.kind,
        .error.message
    )]
    Api {
        attempts: usize,
        max_attempts: usize,
        error: ApiError,
        guidance: Guidance,
    },
}

impl GenerateError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed_output",
            Self::Validation(_) => "validation",
            Self::Api { error, .. } => error.kind.as_str(),
        }
    }
}

/// Returns the slice from the first `<article` to the last `</article>`,
/// inclusive.
pub fn extract_article(response: &str) -> Result<&str, ExtractError> {
    let response = response.trim();
    if response.is_empty() {
        return Err(ExtractError::EmptyResponse);
    }

    let start = response
        .find(ARTICLE_OPEN)
        .ok_or(ExtractError::MissingArticleStart)?;
    let end = response
        .rfind(ARTICLE_CLOSE)
        .filter(|end| *end >= start)
        .ok_or(ExtractError::MissingArticleEnd)?;

    Ok(&response[start..end + ARTICLE_CLOSE.len()])
}

/// Calls the model with retry and backoff, then extracts and validates the
/// article fragment.
#[derive(Clone)]
pub struct Generator {
    model: Arc<dyn LanguageModel>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl Generator {
    pub fn new(model: Arc<dyn LanguageModel>, sleeper: Arc<dyn Sleeper>, policy: RetryPolicy) -> Self {
        Self {
            model,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempt = 0usize;

        loop {
            let err = match self.model.complete(prompt).await {
                Ok(response) => return finish(&response),
                Err(err) => err,
            };

            let api = classify(&format!("{err:#}"));
            tracing::error!(
                attempt = attempt + 1,
                attempts = max_attempts,
                kind = %api.kind,
                error = %api.message,
                "model call failed"
            );

            if !api.retryable || attempt + 1 >= max_attempts {
                return Err(terminal(attempt + 1, max_attempts, api));
            }

            let wait = self.policy.delay(attempt, api.retry_after);
            tracing::warn!(
                attempt = attempt + 1,
                attempts = max_attempts,
                kind = %api.kind,
                wait_secs = wait.as_secs_f64(),
                "retrying model call"
            );
            self.sleeper.sleep(wait).await;
            attempt += 1;
        }
    }
}

fn finish(response: &str) -> Result<String, GenerateError> {
    let preview = preview(response, 200);
    tracing::debug!(response = %preview, "model response");

    let fragment = extract_article(response)?;
    let html = html::validate(fragment)?;
    Ok(html)
}

fn terminal(attempts: usize, max_attempts: usize, error: ApiError) -> GenerateError {
    let guidance = Guidance(error.kind.guidance());
    GenerateError::Api {
        attempts,
        max_attempts,
        error,
        guidance,
    }
}

fn preview(text: &str, edge: usize) -> String {
    let chars = text.chars().count();
    if chars <= edge * 2 {
        return text.to_owned();
    }
    let head = text.chars().take(edge).collect::<String>();
    let tail = text.chars().skip(chars - edge).collect::<String>();
    format!("{head}...{tail}")
}
