//! Error types for the siteforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all siteforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Reasoning backend errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Execution environment errors ---
    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

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
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Malformed response from provider: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Environment creation failed: {0}")]
    CreationFailed(String),

    #[error("No environment exists for session {0}")]
    NotFound(String),

    #[error("File write failed at '{path}': {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Command launch failed: {0}")]
    CommandFailed(String),

    #[error("Service on port {port} not ready after {waited_secs}s")]
    ServiceNotReady { port: u16, waited_secs: u64 },

    #[error("Port exposure failed for port {port}: {reason}")]
    ExposeFailed { port: u16, reason: String },

    #[error("Sandbox API error: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("Corrupt record at '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Missing required argument '{argument}' for tool '{tool_name}'")]
    MissingArgument { tool_name: String, argument: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn sandbox_error_displays_correctly() {
        let err = Error::Sandbox(SandboxError::ServiceNotReady {
            port: 5173,
            waited_secs: 60,
        });
        assert!(err.to_string().contains("5173"));
        assert!(err.to_string().contains("60"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::MissingArgument {
            tool_name: "create_file".into(),
            argument: "file_path".into(),
        });
        assert!(err.to_string().contains("create_file"));
        assert!(err.to_string().contains("file_path"));
    }
}
