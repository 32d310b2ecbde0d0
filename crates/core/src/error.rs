//! Error types for the ferrocode domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use thiserror::Error;

/// Failure of the model transport. These are the only errors (besides
/// checkpoint persistence) that abort a running turn.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Registry-level tool failures. The policy converts all of these into
/// tool-result messages; none of them escape a turn.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint storage error: {0}")]
    Storage(String),

    #[error("Checkpoint header is malformed: {0}")]
    MalformedHeader(String),

    #[error("Summarization failed: {0}")]
    Summarization(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Unknown message role: {0}")]
    UnknownRole(String),

    #[error("Message record is missing '{0}'")]
    MissingField(&'static str),

    #[error("Invalid tool call in message: {0}")]
    InvalidToolCall(String),
}
