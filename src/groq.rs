use std::time::Duration;

use anyhow::Context as _;

use crate::model::LanguageModel;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

pub fn chat_completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

/// Groq's OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    pub fn new(base_url: &str, api_key: String, model: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            endpoint: chat_completions_endpoint(base_url),
            api_key,
            model,
            temperature: 0.0,
        })
    }
}

#[async_trait::async_trait]
impl LanguageModel for GroqClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read Groq response body")?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("Groq API error ({status}): {message}");
        }

        let value: serde_json::Value = serde_json::from_str(&raw).context("parse Groq response")?;
        extract_message_content(&value).context("extract message content")
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_message_content(value: &serde_json::Value) -> anyhow::Result<String> {
    let choices = value
        .get("choices")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("missing `choices` array in response"))?;

    let text = choices
        .iter()
        .filter_map(|choice| choice.pointer("/message/content").and_then(|v| v.as_str()))
        .collect::<String>();

    if text.trim().is_empty() {
        anyhow::bail!("Groq output text is empty");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            chat_completions_endpoint("http://127.0.0.1:1/v1/"),
            "http://127.0.0.1:1/v1/chat/completions"
        );
    }

    #[test]
    fn extract_message_content_joins_choices() -> anyhow::Result<()> {
        let value = serde_json::json!({
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "<article>" } },
                { "index": 1, "message": { "role": "assistant", "content": "</article>" } }
            ]
        });
        assert_eq!(extract_message_content(&value)?, "<article></article>");
        Ok(())
    }

    #[test]
    fn extract_message_content_rejects_empty_output() {
        let value = serde_json::json!({ "choices": [] });
        assert!(extract_message_content(&value).is_err());
        assert!(extract_message_content(&serde_json::json!({})).is_err());
    }

    #[test]
    fn parse_error_message_reads_provider_message() {
        let raw = r#"{"error":{"message":"Rate limit reached. Please retry after 7 seconds","type":"tokens"}}"#;
        assert_eq!(
            parse_error_message(raw).as_deref(),
            Some("Rate limit reached. Please retry after 7 seconds")
        );
        assert_eq!(parse_error_message("<html>oops</html>"), None);
    }
}
