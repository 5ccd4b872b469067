//! Sonar tools for MCP agents.
//!
//! Four request-shaping tools (`sonar_search`, `sonar_ask`, `sonar_research`,
//! `sonar_reason`) that validate their input, forward one chat-completions
//! request to OpenRouter, and render the answer as Markdown or JSON.

/// CLI command implementations.
pub mod commands;
/// Configuration file and environment loading.
pub mod config;
/// Crate-level error type.
pub mod error;
/// MCP server handler.
pub mod server;
/// Validation, prompting, upstream access and normalization.
pub mod sonar;
