//! Error types for the codemate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all codemate operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- GitHub errors ---
    #[error("GitHub error: {0}")]
    GitHub(#[from] GitHubError),

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

    /// Rate limit still in force after the transport's retry budget ran out.
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ProviderError {
    /// Whether this error is a rate-limit condition the caller should
    /// surface as a "try again later" diagnostic.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
            || matches!(self, Self::RetriesExhausted { last_error, .. } if last_error.contains("429"))
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error talking to GitHub: {0}")]
    Network(String),

    #[error("No repository selected — set GITHUB_OWNER/GITHUB_REPO or call switch_repo")]
    NoRepository,

    #[error("Path {0} is not a file")]
    NotAFile(String),

    #[error("Failed to decode file content for {path}: {reason}")]
    DecodeFailed { path: String, reason: String },
}
