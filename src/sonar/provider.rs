use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of one chat-completions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(
        "OpenRouter API key not found. Please set the {key_env} environment variable.\n\
         Get your key at: https://openrouter.ai/keys\n\n\
         In Docker, set it in your .env file:\n\
         {key_env}=your_key_here"
    )]
    MissingApiKey { key_env: String },

    #[error(
        "Authentication failed. Please check your {key_env}. \
         Get a key at: https://openrouter.ai/keys"
    )]
    Unauthorized { key_env: String },

    #[error(
        "Rate limit exceeded. Please wait a moment and try again. \
         Consider upgrading your OpenRouter plan for higher limits."
    )]
    RateLimited,

    #[error("OpenRouter service error ({}). Please try again later.", .status.as_u16())]
    Service { status: StatusCode },

    #[error("API request failed with status {}: {body}", .status.as_u16())]
    Status { status: StatusCode, body: String },

    #[error(
        "Request timed out after {secs} seconds. Try a shorter query or reduce max_tokens."
    )]
    Timeout { secs: u64 },

    #[error("Request to OpenRouter failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("OpenRouter returned a body that is not valid JSON: {0}")]
    InvalidBody(#[source] serde_json::Error),
}

/// Maps a non-success HTTP status onto the matching [`UpstreamError`].
pub fn classify_status(status: StatusCode, body: String, key_env: &str) -> UpstreamError {
    match status {
        StatusCode::UNAUTHORIZED => UpstreamError::Unauthorized {
            key_env: key_env.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited,
        status if status.is_server_error() => UpstreamError::Service { status },
        status => UpstreamError::Status { status, body },
    }
}

/// The single suspension point of a tool call: one request, one parsed body.
///
/// Implementations must not retry. Every failure is returned as-is.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<Value, UpstreamError>;
}
