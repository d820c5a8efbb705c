use super::models::{Model, Usage};
use crate::config::Config;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenRouter direct API base (BYOK mode)
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Rate limit retry configuration
const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;

/// One prompt sent to the text-generation collaborator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: &'static str,
    pub user: String,
    pub model: Model,
}

impl GenerationRequest {
    pub fn new(system: &'static str, user: String, model: Model) -> Self {
        Self {
            system,
            user,
            model,
        }
    }
}

/// Response from LLM including content and usage stats
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
}

/// The hosted model as seen by the orchestrator: prompt text in, reply text out, or a failure.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<LlmResponse>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenRouter (or any OpenAI-compatible endpoint).
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model_override: Option<String>,
    max_retries: u32,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http_client(DEFAULT_TIMEOUT_SECS)?,
            api_key: api_key.into(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            model_override: None,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Build a client from the user's config and stored API key.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.get_api_key().ok_or_else(|| {
            anyhow::anyhow!("No API key configured. Run 'codelift setup' to get started.")
        })?;
        Ok(Self::new(api_key)?
            .with_base_url(config.api_base_url())
            .with_timeout(config.request_timeout_secs())?
            .with_max_retries(config.max_retries())
            .with_model_override(config.model_override()))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> anyhow::Result<Self> {
        self.http = build_http_client(secs)?;
        Ok(self)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn build_http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to create HTTP client")
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    /// Includes automatic retry with exponential backoff for rate limits
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<LlmResponse> {
        let model_id = request.model.resolve(self.model_override.as_deref());
        let body = ChatRequest {
            model: model_id,
            messages: vec![
                Message {
                    role: "system",
                    content: request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.model.max_tokens(),
            stream: false,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let url = self.completions_url();
        let mut retry_count: u32 = 0;

        loop {
            let response = self
                .http
                .post(&url)
                .header("Content-Type", "application/json")
                .header("HTTP-Referer", "https://github.com/codelift/codelift")
                .header("X-Title", "codelift")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await
                .context("Failed to reach the model API")?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to parse model API response: {}\n{}",
                        e,
                        truncate_str(&text, 200)
                    )
                })?;

                let content = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| anyhow::anyhow!("Model returned an empty reply"))?;

                tracing::debug!(
                    model = model_id,
                    tokens = parsed.usage.as_ref().map(|u| u.total_tokens),
                    "model call finished"
                );

                return Ok(LlmResponse {
                    content,
                    usage: parsed.usage,
                    model: parsed.model.unwrap_or_else(|| model_id.to_string()),
                });
            }

            if status.as_u16() == 429 && retry_count < self.max_retries {
                retry_count += 1;
                let retry_after = parse_retry_after(&text)
                    .unwrap_or_else(|| backoff_secs(retry_count))
                    .min(MAX_BACKOFF_SECS);
                tracing::warn!(
                    "Rate limited by the model API. Retrying in {}s (attempt {}/{})",
                    retry_after,
                    retry_count,
                    self.max_retries
                );
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            let error_msg = match status.as_u16() {
                401 => "Invalid API key. Run 'codelift setup' to update it.".to_string(),
                429 => format!(
                    "Rate limited by the model API after {} retries. Try again in a few minutes.",
                    retry_count
                ),
                500..=599 => format!(
                    "Model API server error ({}). The service may be temporarily unavailable.",
                    status
                ),
                _ => format!("API error {}: {}", status, truncate_str(&text, 200)),
            };
            return Err(anyhow::anyhow!("{}", error_msg));
        }
    }
}

/// Extract a retry-after hint ("retry after X seconds") from an error body
/// Exponential wait before retry number `retry_count` (1-based), capped.
fn backoff_secs(retry_count: u32) -> u64 {
    let factor = BACKOFF_MULTIPLIER.saturating_pow(retry_count.saturating_sub(1));
    (INITIAL_BACKOFF_MS.saturating_mul(factor) / 1000).min(MAX_BACKOFF_SECS)
}

fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    text_lower[pos..]
        .split_whitespace()
        .skip(1)
        .take(5)
        .filter_map(|word| {
            word.trim_matches(|c: char| !c.is_numeric())
                .parse::<u64>()
                .ok()
        })
        .find(|secs| *secs > 0 && *secs < 300)
}

/// Truncate a string for display (Unicode-safe)
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
