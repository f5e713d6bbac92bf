//! Error types for the sourcewell domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; the top-level
//! [`Error`] wraps them so a request pipeline can use `?` throughout.

use thiserror::Error;

/// The top-level error type for a request pipeline.
#[derive(Debug, Error)]
pub enum Error {
    // --- Chat model errors ---
    #[error("Chat model error: {0}")]
    Provider(#[from] ProviderError),

    // --- Embedding / vectorization errors ---
    #[error("Embedding service error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Search index errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Blob storage errors ---
    #[error("Blob fetch error: {0}")]
    Blob(#[from] BlobError),

    // --- Token accounting errors ---
    #[error("Token counting error: {0}")]
    Token(#[from] TokenError),

    // --- Request validation ---
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

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

impl Error {
    /// Whether the error came from a downstream collaborator (model, index,
    /// embedding endpoint, blob store) rather than from the request itself.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::Embedding(_) | Self::Retrieval(_) | Self::Blob(_)
        )
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

    #[error("Response contained no choices")]
    EmptyResponse,

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Vectorization endpoint returned {status_code}: {message}")]
    Endpoint { status_code: u16, message: String },

    #[error("Vectorization response was malformed: {0}")]
    Malformed(String),

    #[error("Embedding service not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Search index unreachable: {0}")]
    Unreachable(String),

    #[error("Search index returned {status_code}: {message}")]
    Index { status_code: u16, message: String },

    #[error("Malformed search response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob download failed for {path}: {reason}")]
    Download { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Unsupported model '{0}': expected gpt-35-turbo and above")]
    UnsupportedModel(String),

    #[error("Tokenizer unavailable: {0}")]
    TokenizerUnavailable(String),
}
