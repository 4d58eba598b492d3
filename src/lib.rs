//! thyroid-dx - Thyroid disease classification pipeline
//!
//! This crate turns a patient-record CSV into trained, comparable
//! classifiers:
//! - Domain-rule preprocessing (age filter, policy-table TBG imputation,
//!   age-binned lab imputation, target grouping, one-hot encoding)
//! - SMOTE + Edited Nearest Neighbours balancing of the training partition
//! - Seven classifiers behind one contract, with validation and test metrics
//! - Self-contained model artifacts and a predictor for unseen records
//!
//! # Modules
//!
//! - [`preprocessing`] - Records, policy tables, imputation, encoding
//! - [`synthetic`] - Class balancing (SMOTE, ENN, SMOTEENN)
//! - [`training`] - Classifiers, metrics, splitting and the training engine
//! - [`export`] - Model artifact serialization
//! - [`inference`] - Prediction on unseen records
//! - [`cli`] - Command-line interface
//! - [`utils`] - CSV loading and saving

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod inference;

// Utilities
pub mod export;
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, ThyroidError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, ThyroidError};

    // Preprocessing
    pub use crate::preprocessing::{
        DiagnosticClass, DomainRules, FittedPreprocessor, PatientRecord, PreparedData,
        PreprocessingConfig, Preprocessor,
    };

    // Balancing
    pub use crate::synthetic::{EditedNearestNeighbours, Sampler, SMOTE, SMOTEENN};

    // Training
    pub use crate::training::{
        Classifier, ModelKind, ModelMetrics, PipelineConfig, TrainEngine, TrainedModel,
        TrainingReport,
    };

    // Persistence and inference
    pub use crate::export::{ModelArtifact, ModelMetadata};
    pub use crate::inference::{PredictionResult, Predictor};

    // Data I/O
    pub use crate::utils::{DataLoader, DataSaver};
}
