//! Error types for the document QA pipeline

use thiserror::Error;

/// Result type alias for docqa operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A document could not be read by the extractor
    #[error("Failed to extract '{file}': {message}")]
    ExtractionFailure { file: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Embedding call failed
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Generation call failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Vector dimension disagrees with the index
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Query against an index with no entries
    #[error("Embedding index is empty")]
    EmptyIndex,

    /// Caller passed an argument outside its domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// External call exceeded its per-call timeout
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionFailure {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether a retry has any chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_)
                | Error::Generation(_)
                | Error::Timeout(_)
                | Error::Http(_)
                | Error::Io(_)
        )
    }

    /// Errors that must abort the whole run instead of a single item
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::DimensionMismatch { .. }
                | Error::EmptyIndex
                | Error::InvalidArgument(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::embedding("503").is_retryable());
        assert!(Error::generation("quota").is_retryable());
        assert!(Error::Timeout(std::time::Duration::from_secs(1)).is_retryable());
        assert!(!Error::EmptyIndex.is_retryable());
        assert!(!Error::invalid_argument("k must be positive").is_retryable());
    }

    #[test]
    fn test_structural_classification() {
        assert!(Error::EmptyIndex.is_structural());
        assert!(Error::DimensionMismatch { expected: 3, actual: 2 }.is_structural());
        assert!(!Error::generation("boom").is_structural());
        assert!(!Error::extraction("a.pdf", "broken").is_structural());
    }
}
