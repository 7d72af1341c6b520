//! Error types for the autoprep pipeline

use thiserror::Error;

/// Result type alias for preprocessing operations
pub type Result<T> = std::result::Result<T, PrepError>;

/// Main error type for training and serving preprocessing
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Label column is not set. Use set_label to designate a column as the label")]
    LabelNotSet,

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Unsupported data format: {0}")]
    UnsupportedFormat(String),

    #[error("Artifact version mismatch: schema {schema} vs constants {constants}")]
    ArtifactMismatch { schema: String, constants: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<polars::error::PolarsError> for PrepError {
    fn from(err: polars::error::PolarsError) -> Self {
        PrepError::DataError(err.to_string())
    }
}
