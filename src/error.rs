//! Error types for the document question-answering pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model not found: {0}")]
    ModelNotFound(String),

    #[error("failed to load embedding model: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("input {index} has {tokens} tokens, model accepts at most {max}")]
    InputTooLong {
        index: usize,
        tokens: usize,
        max: usize,
    },

    #[error("inference error: {0}")]
    InferenceError(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to the vector index lifecycle.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index build failed: {0}")]
    Build(String),

    #[error("no index found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("index at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("index is incompatible with current settings: {0}")]
    Incompatible(String),

    #[error("index has no entries")]
    Empty,

    #[error("query vector has dimension {actual}, index expects {expected}")]
    QueryDimension { expected: usize, actual: usize },

    #[error("index IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Whether a fresh build is the right response to this load failure.
    pub fn calls_for_rebuild(&self) -> bool {
        matches!(
            self,
            IndexError::NotFound(_) | IndexError::Corrupt { .. } | IndexError::Incompatible(_)
        )
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors related to reading documents from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("directory walk error: {0}")]
    WalkError(String),

    #[error("file read error: {}: {reason}", path.display())]
    ReadError { path: PathBuf, reason: String },

    #[error("invalid exclude pattern '{pattern}': {reason}")]
    PatternError { pattern: String, reason: String },
}

/// Errors related to building an index.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("document source error: {0}")]
    Source(#[from] SourceError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("embedder returned {actual} vectors for {expected} chunks")]
    VectorCount { expected: usize, actual: usize },
}

/// Errors related to answering a question.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_classification() {
        assert!(IndexError::NotFound(PathBuf::from("/tmp/x")).calls_for_rebuild());
        assert!(IndexError::corrupt("/tmp/x", "bad magic").calls_for_rebuild());
        assert!(IndexError::Incompatible("model changed".to_string()).calls_for_rebuild());
        assert!(!IndexError::Empty.calls_for_rebuild());
        assert!(
            !IndexError::QueryDimension {
                expected: 3,
                actual: 4
            }
            .calls_for_rebuild()
        );
    }

    #[test]
    fn test_error_messages() {
        let err = EmbeddingError::InputTooLong {
            index: 2,
            tokens: 300,
            max: 256,
        };
        assert_eq!(
            err.to_string(),
            "input 2 has 300 tokens, model accepts at most 256"
        );

        let err = IndexError::corrupt("/data/index", "checksum mismatch");
        assert_eq!(
            err.to_string(),
            "index at /data/index is corrupt: checksum mismatch"
        );
    }

    #[test]
    fn test_app_error_wraps_domain_errors() {
        let err: AppError = QueryError::from(IndexError::Empty).into();
        assert!(matches!(err, AppError::Query(QueryError::Index(IndexError::Empty))));
        assert_eq!(err.to_string(), "query error: index error: index has no entries");
    }
}
