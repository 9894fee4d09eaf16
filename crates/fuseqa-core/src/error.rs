//! Error types for the retrieval-fusion pipeline.

use thiserror::Error;

use crate::types::SourceKind;

/// Result type alias using QaError.
pub type Result<T> = std::result::Result<T, QaError>;

/// Errors that can occur while executing a query.
///
/// Only `RetrievalUnavailable`, `Timeout` and `Cancelled` ever escape
/// `Pipeline::execute`; the remaining kinds are produced by collaborators
/// and absorbed by the partial-tolerance and rerank-degradation paths.
#[derive(Error, Debug)]
pub enum QaError {
    /// Both retrieval sources failed; no evidence to work with.
    #[error("Both retrieval sources failed (semantic: {semantic}; lexical: {lexical})")]
    RetrievalUnavailable { semantic: String, lexical: String },

    /// The deadline elapsed before a usable result existed.
    #[error("Deadline exceeded after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The caller cancelled the query before it produced a usable result.
    #[error("Query cancelled")]
    Cancelled,

    /// A single search backend failed.
    #[error("{kind} search failed: {message}")]
    Search { kind: SourceKind, message: String },

    /// The relevance-scoring collaborator failed.
    #[error("Relevance scorer failed: {message}")]
    Scorer { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QaError {
    /// Create a search backend error.
    pub fn search(source: SourceKind, message: impl Into<String>) -> Self {
        Self::Search {
            kind: source,
            message: message.into(),
        }
    }

    /// Create a relevance scorer error.
    pub fn scorer(message: impl Into<String>) -> Self {
        Self::Scorer {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole query.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RetrievalUnavailable { .. } | Self::Timeout { .. } | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QaError::search(SourceKind::Lexical, "index missing");
        assert_eq!(err.to_string(), "lexical search failed: index missing");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(QaError::Cancelled.is_fatal());
        assert!(QaError::Timeout { elapsed_ms: 10 }.is_fatal());
        assert!(!QaError::scorer("503").is_fatal());
        assert!(!QaError::search(SourceKind::Semantic, "down").is_fatal());
    }
}
