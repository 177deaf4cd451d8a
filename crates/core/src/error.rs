//! Error types for the Glossa domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` unifies them for the
//! workflow loop.

use thiserror::Error;

/// The top-level error type for all Glossa operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Context store errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Workflow ---
    #[error("A workflow is already running")]
    Busy,

    #[error("Workflow exceeded {max_turns} model turns without completing")]
    TurnLimit { max_turns: u32 },

    #[error("Workflow cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error is a user-initiated stop rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled | Error::Provider(ProviderError::Cancelled) => true,
            Error::Tool(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Model reported a stream error: {0}")]
    Stream(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Model call failed inside tool: {0}")]
    Provider(#[from] ProviderError),

    #[error("Pending decision was superseded before it was resolved")]
    DecisionSuperseded,

    #[error("Gave up on segment after {rejections} rejected translations: {segment}")]
    ReviewExhausted { segment: String, rejections: u32 },

    #[error("Tool execution cancelled")]
    Cancelled,
}

impl ToolError {
    /// Whether this error was caused by conversation cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ToolError::Cancelled | ToolError::Provider(ProviderError::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("Context is empty, there is no last message to update")]
    Empty,

    #[error("Message not found: {0}")]
    NotFound(String),
}
