//! Error types for the Docbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error enum; the pipeline folds
//! them into [`Error`] without rewrapping their messages.

use thiserror::Error;

/// The top-level error type for all Docbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Upstream: language model ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Upstream: vector similarity search ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Caller-side budget check ---
    #[error("Question is {tokens} tokens, the limit is {max}")]
    BudgetExceeded { tokens: usize, max: usize },

    // --- Configuration errors (fatal at construction) ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error came from an upstream service (LLM or vector store).
    ///
    /// Upstream failures abandon the turn; callers show the fallback message
    /// and never persist the partial answer.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Retrieval(_))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator errors ---

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

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Vector store request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Vector store authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed vector store response: {0}")]
    InvalidResponse(String),

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Vector store request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}
