//! The request pipeline behind every tool.
//!
//! Input is validated into an [`request::OperationRequest`], rendered into a
//! single user message, sent upstream once, and normalized into the caller's
//! chosen envelope.

/// Response extraction, truncation and envelope rendering.
pub mod normalize;
/// OpenRouter chat-completions client.
pub mod openrouter;
/// Per-operation plans and the shared call pipeline.
pub mod pipeline;
/// Prompt templates.
pub mod prompt;
/// Upstream seam: chat payload types and the transport trait.
pub mod provider;
/// Operation input types and validation.
pub mod request;
/// Tool catalog and JSON input schemas.
pub mod tools;
