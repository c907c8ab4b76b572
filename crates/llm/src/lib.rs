//! Language-model collaborator: the `LanguageModel` seam and an
//! OpenAI-compatible chat-completions client pointed at OpenRouter.

mod openrouter;

use async_trait::async_trait;
use thiserror::Error;

pub use openrouter::{OpenRouterClient, OpenRouterConfig};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";
pub const DEFAULT_APP_REFERER: &str = "https://nist-csf-agent.onrender.com";
pub const DEFAULT_APP_TITLE: &str = "NIST CSF AI Agent";
pub const TEMPERATURE: f32 = 0.0;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model response was malformed: {0}")]
    Malformed(String),

    #[error("language model returned no completion text")]
    EmptyCompletion,
}

impl LlmError {
    /// Transport failures, rate limiting and provider-side errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Malformed(_) | Self::EmptyCompletion => false,
        }
    }
}

/// A hosted model that turns a prompt into free text.
///
/// Implementations are shared across concurrent requests and must not keep
/// per-request state.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
