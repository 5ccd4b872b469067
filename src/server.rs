//! MCP server handler.
//!
//! Advertises the tool catalog and routes `tools/call` requests into the
//! shared [`Sonar`] pipeline. Tool failures come back as tool results with
//! `is_error` set so the calling agent sees the message; only unknown tool
//! names are protocol errors.

use std::sync::Arc;

use rmcp::ErrorData as McpError;
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
    ToolAnnotations,
};
use rmcp::service::{RequestContext, RoleServer};
use tracing::warn;

use crate::sonar::pipeline::Sonar;
use crate::sonar::request::{Operation, Params};
use crate::sonar::tools::{self, ToolSpec};

const INSTRUCTIONS: &str = "Web-augmented answers from Perplexity Sonar via OpenRouter.\n\n\
    Tools:\n\
    • sonar_search: quick to detailed web search with citations\n\
    • sonar_ask: conversational question, optional context\n\
    • sonar_research: multi-source research report, optional focus areas\n\
    • sonar_reason: step-by-step reasoning over a complex problem\n\n\
    Every tool accepts response_format 'markdown' (default) or 'json'.";

#[derive(Clone)]
pub struct SonarServer {
    sonar: Sonar,
    tools: Arc<Vec<Tool>>,
}

impl SonarServer {
    pub fn new(sonar: Sonar) -> Self {
        let tools = tools::catalog().iter().map(mcp_tool).collect();
        Self {
            sonar,
            tools: Arc::new(tools),
        }
    }

    /// Runs one tool and folds any failure into an error result.
    pub async fn call(&self, operation: Operation, params: &Params) -> CallToolResult {
        match self.sonar.call(operation, params).await {
            Ok(text) => CallToolResult::success(vec![Content::text(text)]),
            Err(err) => {
                warn!(tool = %operation, kind = ?err.kind(), "tool call failed");
                CallToolResult::error(vec![Content::text(err.to_string())])
            }
        }
    }
}

fn mcp_tool(spec: &ToolSpec) -> Tool {
    let mut tool = Tool::new(spec.name(), spec.description, spec.input_schema());
    tool.annotations = Some(ToolAnnotations {
        title: Some(spec.title.to_string()),
        read_only_hint: Some(spec.hints.read_only_hint),
        destructive_hint: Some(spec.hints.destructive_hint),
        idempotent_hint: Some(spec.hints.idempotent_hint),
        open_world_hint: Some(spec.hints.open_world_hint),
    });
    tool
}

impl ServerHandler for SonarServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools.as_ref().clone()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let operation = Operation::from_tool_name(&request.name).ok_or_else(|| {
            McpError::invalid_params(format!("Unknown tool '{}'", request.name), None)
        })?;
        let params = request.arguments.unwrap_or_default();
        Ok(self.call(operation, &params).await)
    }
}

#[cfg(test)]
mod tests {
    use super::mcp_tool;
    use crate::sonar::request::Operation;
    use crate::sonar::tools;

    #[test]
    fn mcp_tools_carry_schema_and_annotations() {
        let tool = mcp_tool(&tools::spec(Operation::Ask));
        assert_eq!(tool.name, "sonar_ask");
        assert_eq!(
            tool.input_schema.get("additionalProperties"),
            Some(&serde_json::Value::Bool(false))
        );
        let annotations = tool.annotations.expect("annotations");
        assert_eq!(annotations.title.as_deref(), Some("Ask Sonar a Question"));
        assert_eq!(annotations.read_only_hint, Some(true));
        assert_eq!(annotations.idempotent_hint, Some(false));
    }
}
