//! Error types for the lotwise pipeline

use thiserror::Error;

/// Result type alias for lotwise operations
pub type Result<T> = std::result::Result<T, LotwiseError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum LotwiseError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Selection error: {0}")]
    SelectionError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("segment {key}: {source}")]
    SegmentError {
        key: String,
        #[source]
        source: Box<LotwiseError>,
    },
}

impl LotwiseError {
    /// Wrap an error as a contained per-segment failure.
    pub fn for_segment(key: &str, err: LotwiseError) -> Self {
        LotwiseError::SegmentError {
            key: key.to_string(),
            source: Box::new(err),
        }
    }
}

impl From<polars::error::PolarsError> for LotwiseError {
    fn from(err: polars::error::PolarsError) -> Self {
        LotwiseError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for LotwiseError {
    fn from(err: serde_json::Error) -> Self {
        LotwiseError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LotwiseError {
    fn from(err: ndarray::ShapeError) -> Self {
        LotwiseError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LotwiseError::DataError("bad split value".to_string());
        assert_eq!(err.to_string(), "Data error: bad split value");
    }

    #[test]
    fn test_segment_wrapping() {
        let inner = LotwiseError::SelectionError("need 50 columns, got 12".to_string());
        let err = LotwiseError::for_segment("DOWNTOWN", inner);
        assert_eq!(
            err.to_string(),
            "segment DOWNTOWN: Selection error: need 50 columns, got 12"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LotwiseError = io_err.into();
        assert!(matches!(err, LotwiseError::IoError(_)));
    }
}
