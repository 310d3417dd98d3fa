//! Error types for the Firechat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator of the session has its own error family:
//! - [`ProviderError`]: inference failures (endpoint unreachable, rate limited, bad output)
//! - [`ToolError`]: tool invocation failures surfaced by the tool server
//! - [`ProtocolError`]: failures of the tool-server channel itself (spawn, handshake, framing)

use thiserror::Error;

/// The top-level error type for all Firechat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Tool server protocol errors ---
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

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

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The channel to the tool server failed while the call was in flight.
    #[error("Tool transport failed: {tool_name}: {reason}")]
    Transport { tool_name: String, reason: String },
}

impl ToolError {
    /// Whether the reasoning loop can report this error back to the model
    /// and keep going. Transport failures mean the tool server is gone.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ToolError::Transport { .. })
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to launch tool server `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Tool server I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tool server closed the channel")]
    Closed,

    #[error("Tool server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Tool server did not answer `{method}` within {timeout_secs}s")]
    Timeout { method: String, timeout_secs: u64 },

    #[error("Malformed message from tool server: {0}")]
    Malformed(String),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),
}
