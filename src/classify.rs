use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

pub const DEFAULT_RATE_LIMIT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    RateLimit,
    ContextLength,
    InvalidRequest,
    AuthError,
    ServerError,
    Timeout,
    Unknown,
}

impl ApiErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::ContextLength => "context_length",
            Self::InvalidRequest => "invalid_request",
            Self::AuthError => "auth_error",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }

    /// Hint appended to the terminal error for kinds a user can act on.
    pub fn guidance(self) -> Option<&'static str> {
        match self {
            Self::ContextLength => {
                Some("the text is too long for the model; lower --max-chunk-tokens")
            }
            Self::AuthError => Some("check the GROQ_API_KEY value in the environment or .env"),
            _ => None,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
}

// Order matters: the first pattern contained in the message wins.
const PATTERNS: &[(&str, ApiErrorKind)] = &[
    ("rate limit", ApiErrorKind::RateLimit),
    ("too many requests", ApiErrorKind::RateLimit),
    ("context length", ApiErrorKind::ContextLength),
    ("maximum context length", ApiErrorKind::ContextLength),
    ("invalid request", ApiErrorKind::InvalidRequest),
    ("unauthorized", ApiErrorKind::AuthError),
    ("authentication failed", ApiErrorKind::AuthError),
    ("internal server error", ApiErrorKind::ServerError),
    ("service unavailable", ApiErrorKind::ServerError),
    ("timeout", ApiErrorKind::Timeout),
    ("deadline exceeded", ApiErrorKind::Timeout),
    ("timed out", ApiErrorKind::Timeout),
];

static RETRY_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"retry after (\d+)").expect("retry-after pattern is valid")
});

pub fn classify(message: &str) -> ApiError {
    let lowered = message.to_lowercase();

    let kind = PATTERNS
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, kind)| *kind)
        .unwrap_or(ApiErrorKind::Unknown);

    let retry_after = match kind {
        ApiErrorKind::RateLimit => {
            Some(parse_retry_after(&lowered).unwrap_or(DEFAULT_RATE_LIMIT_RETRY_AFTER))
        }
        _ => None,
    };

    ApiError {
        kind,
        message: message.to_owned(),
        retryable: kind.is_retryable(),
        retry_after,
    }
}

fn parse_retry_after(lowered: &str) -> Option<Duration> {
    let captures = RETRY_AFTER.captures(lowered)?;
    let secs: u64 = captures.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_known_patterns_case_insensitively() {
        let cases = [
            ("Rate limit reached for model", ApiErrorKind::RateLimit),
            ("HTTP 429 Too Many Requests", ApiErrorKind::RateLimit),
            (
                "This model's maximum context length is 8192 tokens",
                ApiErrorKind::ContextLength,
            ),
            ("Invalid request: bad field", ApiErrorKind::InvalidRequest),
            ("401 Unauthorized", ApiErrorKind::AuthError),
            ("Authentication failed", ApiErrorKind::AuthError),
            ("500 Internal Server Error", ApiErrorKind::ServerError),
            ("503 Service Unavailable", ApiErrorKind::ServerError),
            ("request timeout", ApiErrorKind::Timeout),
            ("Deadline exceeded", ApiErrorKind::Timeout),
            ("error sending request: operation timed out", ApiErrorKind::Timeout),
            ("something odd happened", ApiErrorKind::Unknown),
        ];

        for (message, expected) in cases {
            assert_eq!(classify(message).kind, expected, "message={message}");
        }
    }

    #[test]
    fn classify_first_match_wins() {
        let err = classify("rate limit hit while waiting on timeout");
        assert_eq!(err.kind, ApiErrorKind::RateLimit);

        let err = classify("invalid request: unauthorized scope");
        assert_eq!(err.kind, ApiErrorKind::InvalidRequest);
    }

    #[test]
    fn classify_sets_retry_policy() {
        for message in ["rate limit", "service unavailable", "timeout"] {
            assert!(classify(message).retryable, "message={message}");
        }
        for message in ["context length", "invalid request", "unauthorized", "boom"] {
            let err = classify(message);
            assert!(!err.retryable, "message={message}");
            assert_eq!(err.retry_after, None, "message={message}");
        }
    }

    #[test]
    fn rate_limit_parses_retry_after_hint() {
        let err = classify("Rate limit exceeded, Retry after 17 seconds");
        assert_eq!(err.retry_after, Some(Duration::from_secs(17)));
    }

    #[test]
    fn rate_limit_defaults_retry_after() {
        let err = classify("rate limit exceeded");
        assert_eq!(err.retry_after, Some(DEFAULT_RATE_LIMIT_RETRY_AFTER));
    }

    #[test]
    fn classify_keeps_original_message() {
        let err = classify("Service Unavailable: try later");
        assert_eq!(err.message, "Service Unavailable: try later");
        assert_eq!(err.to_string(), "server_error: Service Unavailable: try later");
    }
}
