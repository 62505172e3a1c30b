use crate::config::Config;
use crate::error::LlmError;
use crate::events::ChatMessage;
use crate::prompts::NO_RESPONSE;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Response header carrying the rate-limit reset time (millisecond epoch)
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Anything that can turn a message list into one assistant reply.
///
/// The message list already starts with the system prompt. Implementations
/// report rate limiting as [`LlmError::RateLimited`] so callers can tell it
/// apart from other failures.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError>;
}

/// Body of a chat-completions request
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// OpenRouter chat-completions client
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    referer: String,
    title: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Build a client from configuration. Fails if no API key is available.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key().with_context(|| {
            format!(
                "No API key configured. Set {} or add openrouter_api_key to the config file.",
                crate::config::API_KEY_ENV
            )
        })?;

        // No request timeout: a call resolves or fails on the transport's terms.
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.completions_url(),
            model: config.model.clone(),
            api_key,
            referer: config.referer.clone(),
            title: config.title.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let payload = CompletionRequest {
            model: &self.model,
            messages: &messages,
        };

        info!(model = %self.model, messages = messages.len(), "sending completion request");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", self.referer.as_str())
            .header("X-Title", self.title.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let reset = response
            .headers()
            .get(RATE_LIMIT_RESET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        check_rate_limit(status, reset)?;

        let raw = response.text().await?;
        debug!(status = status.as_u16(), body = %raw, "raw completion response");

        parse_reply(status, &raw)
    }
}

/// Rate limiting is detected before the body is read.
pub fn check_rate_limit(status: StatusCode, reset: Option<String>) -> Result<(), LlmError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!(reset = reset.as_deref().unwrap_or("-"), "completion request rate limited");
        return Err(LlmError::RateLimited { reset });
    }
    Ok(())
}

/// Turn a raw response body into reply text.
pub fn parse_reply(status: StatusCode, raw: &str) -> Result<String, LlmError> {
    if !status.is_success() {
        return Err(LlmError::RequestFailed {
            status: status.as_u16(),
            body: raw.to_string(),
        });
    }

    let data: Value = serde_json::from_str(raw)?;
    Ok(extract_reply(&data))
}

/// `choices[0].message.content`, or the fallback text if any link is missing.
pub fn extract_reply(data: &Value) -> String {
    data.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .unwrap_or(NO_RESPONSE)
        .to_string()
}
