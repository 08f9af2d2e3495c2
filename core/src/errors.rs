//! Error types for Gigaflow core operations

use thiserror::Error;

/// Main error type for Gigaflow core operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("LLM connector error: {0}")]
    Llm(#[from] LlmError),

    #[error("Conversation memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Item {index} failed: {source}")]
    ItemFailed {
        index: usize,
        #[source]
        source: LlmError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors related to calls against the chat API
#[derive(Error, Debug)]
pub enum LlmError {
    /// The auth endpoint refused the credentials, or no token could be obtained
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Non-2xx answer from a substantive endpoint
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout during LLM call")]
    Timeout,

    #[error("Failed to parse LLM response: {0}")]
    ResponseParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal connector error: {0}")]
    InternalError(String),
}

impl LlmError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by tool invocations.
///
/// These never leave the orchestrator: they are folded into a function
/// result message so the model can react to them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    NotFound(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Errors related to the external conversation memory
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Failed to load memory: {0}")]
    LoadFailed(String),

    #[error("Failed to save memory: {0}")]
    SaveFailed(String),

    #[error("Operation not supported by this memory")]
    Unsupported,
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;
