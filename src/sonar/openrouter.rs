use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::UpstreamSettings;
use crate::sonar::provider::{ChatRequest, Upstream, UpstreamError, classify_status};

/// OpenRouter chat-completions client. One POST per call, no retries.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    settings: UpstreamSettings,
}

impl OpenRouterClient {
    pub fn new(settings: UpstreamSettings) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(UpstreamError::Transport)?;
        Ok(Self { client, settings })
    }

    fn request_error(&self, source: reqwest::Error) -> UpstreamError {
        if source.is_timeout() {
            UpstreamError::Timeout {
                secs: self.settings.timeout_secs,
            }
        } else {
            UpstreamError::Transport(source)
        }
    }
}

#[async_trait]
impl Upstream for OpenRouterClient {
    async fn send(&self, request: &ChatRequest) -> Result<Value, UpstreamError> {
        let key_env = &self.settings.api_key_env;
        let api_key = self
            .settings
            .api_key()
            .ok_or_else(|| UpstreamError::MissingApiKey {
                key_env: key_env.clone(),
            })?;

        debug!(
            endpoint = %self.settings.endpoint,
            model = %request.model,
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "sending chat-completions request"
        );

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&api_key)
            .header("HTTP-Referer", &self.settings.referer)
            .header("X-Title", &self.settings.title)
            .json(request)
            .send()
            .await
            .map_err(|source| self.request_error(source))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|source| self.request_error(source))?;
            return Err(classify_status(status, body, key_env));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| self.request_error(source))?;
        serde_json::from_slice(&bytes).map_err(UpstreamError::InvalidBody)
    }
}
