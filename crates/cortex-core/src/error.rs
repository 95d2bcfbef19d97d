//! Error types for Cortex

use thiserror::Error;

/// Result type alias using Cortex's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Cortex error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Network errors (E100-E199)
    #[error("Network error: {0}. Check that the provider endpoint is reachable.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("Malformed response from provider: {0}")]
    MalformedResponse(String),

    // Embedding errors (E200-E299)
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Vector dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Store errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Collection '{0}' not found. It is created when the semantic cache starts.")]
    CollectionNotFound(String),

    #[error("Operation '{0}' timed out after {1} seconds")]
    Timeout(String, u64),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::MalformedResponse(_) => "E103",
            Self::EmbeddingFailed(_) => "E200",
            Self::DimensionMismatch { .. } => "E201",
            Self::DatabaseError(_) => "E400",
            Self::CollectionNotFound(_) => "E401",
            Self::Timeout(..) => "E402",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) => Some("cortex config get llm.api_key".to_string()),
            Self::DimensionMismatch { expected, .. } => Some(format!(
                "cortex config set embedding.dimension {}",
                expected
            )),
            Self::ConfigError(_) => Some("cortex config list".to_string()),
            _ => None,
        }
    }

    /// Whether this failure belongs to the transient infrastructure class
    ///
    /// Transient failures degrade to a cache miss, an empty fact list or a
    /// skipped write; they are never surfaced to the request path.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::RateLimited(_)
                | Self::DatabaseError(_)
                | Self::Timeout(..)
                | Self::Io(_)
        )
    }
}
