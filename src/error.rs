//! Error types for the diabetes MLOps pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MlopsError>;

/// Main error type. Each variant corresponds to one failure class of the
/// validate → train → persist → serve flow so callers can tell them apart.
#[derive(Error, Debug)]
pub enum MlopsError {
    #[error("Schema violation: {type_errors} type error(s), {content_errors} content error(s)")]
    SchemaViolation {
        type_errors: usize,
        content_errors: usize,
    },

    #[error("Pipeline construction error: {0}")]
    PipelineConstruction(String),

    #[error("Pipeline check failed for column '{column}': {reason}")]
    PipelineCheck { column: String, reason: String },

    #[error("Training error in {family}: {reason}")]
    Training { family: String, reason: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Unknown parameter '{name}' for {family}")]
    UnknownParameter { family: String, name: String },

    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Label encoding error: {0}")]
    LabelEncoding(String),

    #[error("No model qualified for persistence")]
    NoModelFound,

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl MlopsError {
    /// Shorthand for a per-family training failure
    pub fn training(family: impl Into<String>, reason: impl Into<String>) -> Self {
        MlopsError::Training {
            family: family.into(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for MlopsError {
    fn from(err: polars::error::PolarsError) -> Self {
        MlopsError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for MlopsError {
    fn from(err: serde_json::Error) -> Self {
        MlopsError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MlopsError {
    fn from(err: ndarray::ShapeError) -> Self {
        MlopsError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
