//! Error types for the document generation pipeline.

use std::time::Duration;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Pipeline errors.
///
/// Section-level failures never surface through this type on their own; they are
/// recorded on the section result. Only whole-run failures are returned as `Err`.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("Invalid section plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Insufficient content for {section}: {length} characters (minimum {minimum})")]
    InsufficientContent {
        section: String,
        length: usize,
        minimum: usize,
    },

    #[error("No content generated: all {failed} sections failed")]
    NoContentGenerated { failed: usize },

    #[error("Generation unavailable: structured strategy failed ({structured}); single-prompt strategy failed ({single_prompt})")]
    GenerationUnavailable {
        structured: String,
        single_prompt: String,
    },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GenerationError {
    /// Whether this error can be recovered from by switching generation strategy.
    ///
    /// Bad input and cancellation are final; anything that came out of the backend or
    /// the structured run itself is worth a second attempt with the single-prompt path.
    pub fn is_retryable_by_fallback(&self) -> bool {
        !matches!(
            self,
            GenerationError::UnknownDocumentType(_)
                | GenerationError::InvalidPlan(_)
                | GenerationError::InvalidRequest(_)
                | GenerationError::Cancelled
                | GenerationError::Config(_)
        )
    }
}

impl From<config::ConfigError> for GenerationError {
    fn from(err: config::ConfigError) -> Self {
        GenerationError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failures_are_retryable() {
        assert!(GenerationError::Backend("down".to_string()).is_retryable_by_fallback());
        assert!(GenerationError::Timeout(Duration::from_secs(1)).is_retryable_by_fallback());
        assert!(GenerationError::NoContentGenerated { failed: 3 }.is_retryable_by_fallback());
    }

    #[test]
    fn input_errors_are_not_retryable() {
        assert!(!GenerationError::UnknownDocumentType("x".to_string()).is_retryable_by_fallback());
        assert!(!GenerationError::InvalidRequest("x".to_string()).is_retryable_by_fallback());
        assert!(!GenerationError::Cancelled.is_retryable_by_fallback());
    }
}
