use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    LanguageModel, LlmError, DEFAULT_APP_REFERER, DEFAULT_APP_TITLE, DEFAULT_BASE_URL,
    DEFAULT_MODEL, TEMPERATURE,
};

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub referer: String,
    pub title: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl OpenRouterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            referer: DEFAULT_APP_REFERER.to_string(),
            title: DEFAULT_APP_TITLE.to_string(),
            connect_timeout: Duration::from_secs(6),
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(250),
        }
    }

    fn completions_endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [CompletionMessage<'a>; 1],
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat-completions client. Build once and share; `reqwest::Client` pools
/// connections internally and is safe for concurrent use.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    endpoint: String,
    config: OpenRouterConfig,
}

impl OpenRouterClient {
    pub fn new(config: OpenRouterConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.completions_endpoint(),
            config,
        })
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &self.config.model,
            temperature: TEMPERATURE,
            messages: [CompletionMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let bytes = response.bytes().await?;
        let payload: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|error| LlmError::Malformed(format!("invalid JSON body: {error}")))?;

        extract_completion(&payload)
    }
}

#[async_trait]
impl LanguageModel for OpenRouterClient {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0_u32;
        loop {
            match self.complete_once(prompt).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "completion received");
                    return Ok(text);
                }
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self
                        .config
                        .retry_base_delay
                        .saturating_mul(1_u32 << attempt.min(16));
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying language model call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn extract_completion(payload: &serde_json::Value) -> Result<String, LlmError> {
    // Providers behind OpenRouter can report failures inside a 200 response.
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(|value| value.as_str())
            .unwrap_or("unspecified provider error");
        return Err(LlmError::Malformed(format!("provider error: {message}")));
    }

    let content = payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .ok_or_else(|| LlmError::Malformed("missing choices[0].message.content".to_string()))?;

    match content {
        // A blank string is still a completion; the sanitizer turns it into "".
        serde_json::Value::String(text) => Ok(text.clone()),
        serde_json::Value::Null => Err(LlmError::EmptyCompletion),
        _ => Err(LlmError::Malformed(
            "completion content is not a string".to_string(),
        )),
    }
}
