use std::sync::Arc;

use crate::config::UpstreamSettings;
use crate::sonar::openrouter::OpenRouterClient;
use crate::sonar::pipeline::Sonar;

/// One-shot local tool calls.
pub mod call;
/// Configuration inspection.
pub mod config;
/// MCP stdio server.
pub mod serve;
/// Tool catalog output.
pub mod tools;

/// Wires the OpenRouter client into the shared pipeline.
pub(crate) fn build_sonar(settings: &UpstreamSettings) -> Result<Sonar, String> {
    let client = OpenRouterClient::new(settings.clone())
        .map_err(|err| format!("Failed to build HTTP client: {err}"))?;
    Ok(Sonar::new(Arc::new(client), settings.models.clone()))
}
