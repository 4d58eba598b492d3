//! Error types for the thyroid diagnosis pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ThyroidError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum ThyroidError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Unknown target code '{0}' (not present in the diagnostic lookup table)")]
    UnknownTargetCode(String),

    #[error("Age {age} of patient '{patient_id}' is below the TBG imputation table (ages from 1)")]
    AgeOutOfDomain { patient_id: String, age: f64 },

    #[error("Sex '{sex}' of patient '{patient_id}' is outside the TBG imputation table (M/F)")]
    SexOutOfDomain { patient_id: String, sex: String },

    #[error("Imputation error: {0}")]
    ImputationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Model artifact {} is unusable: {reason}. Retrain with `thyroid-dx train` to regenerate it", path.display())]
    ModelArtifact { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ThyroidError {
    /// Wrap any displayable failure as a model-artifact error for `path`
    pub fn artifact(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ThyroidError::ModelArtifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for ThyroidError {
    fn from(err: polars::error::PolarsError) -> Self {
        ThyroidError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ThyroidError {
    fn from(err: serde_json::Error) -> Self {
        ThyroidError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ThyroidError {
    fn from(err: bincode::Error) -> Self {
        ThyroidError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ThyroidError {
    fn from(err: ndarray::ShapeError) -> Self {
        ThyroidError::ShapeError {
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
        let err = ThyroidError::UnknownTargetCode("ZZ".to_string());
        assert_eq!(
            err.to_string(),
            "Unknown target code 'ZZ' (not present in the diagnostic lookup table)"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ThyroidError = io_err.into();
        assert!(matches!(err, ThyroidError::IoError(_)));
    }

    #[test]
    fn test_artifact_error_mentions_retrain() {
        let err = ThyroidError::artifact("models/Random_Forest.model", "checksum mismatch");
        let msg = err.to_string();
        assert!(msg.contains("Random_Forest.model"));
        assert!(msg.contains("Retrain"));
    }
}
