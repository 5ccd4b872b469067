use rmcp::service::ServiceExt;
use rmcp::transport::io::stdio;
use tracing::info;

use crate::commands::build_sonar;
use crate::config;
use crate::server::SonarServer;

/// Serves the tools over stdio until the client disconnects.
pub async fn run() -> Result<(), String> {
    let settings = config::load()?;
    let upstream = &settings.upstream;
    info!(
        config = %settings.path.display(),
        config_found = settings.file_found,
        endpoint = %upstream.endpoint,
        model = %upstream.models.model,
        reasoning_model = %upstream.models.reasoning_model,
        api_key_present = upstream.is_api_key_present(),
        "starting sonar MCP server"
    );

    let server = SonarServer::new(build_sonar(upstream)?);
    let service = server
        .serve(stdio())
        .await
        .map_err(|err| format!("Failed to start MCP service: {err}"))?;
    info!("serving on stdio");

    let reason = service
        .waiting()
        .await
        .map_err(|err| format!("MCP service stopped unexpectedly: {err}"))?;
    info!(?reason, "server shutdown complete");
    Ok(())
}
