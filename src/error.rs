use thiserror::Error;

use crate::sonar::provider::UpstreamError;
use crate::sonar::request::ValidationError;

/// Result type for a single tool call.
pub type Result<T> = std::result::Result<T, SonarError>;

/// Coarse classification of a [`SonarError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    CredentialMissing,
    Upstream,
    MalformedResponse,
}

/// Every way a tool call can fail. All variants are terminal for the call.
#[derive(Debug, Error)]
pub enum SonarError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Invalid API response structure: {0}")]
    MalformedResponse(String),

    #[error("Failed to encode JSON response: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl SonarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Upstream(UpstreamError::MissingApiKey { .. }) => ErrorKind::CredentialMissing,
            Self::Upstream(UpstreamError::InvalidBody(_)) => ErrorKind::MalformedResponse,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::MalformedResponse(_) | Self::Encoding(_) => ErrorKind::MalformedResponse,
        }
    }
}
