//! Data preprocessing module
//!
//! Turns raw patient records into model-ready data:
//! - Age filtering and companion-column pruning
//! - Sex mode, TBG policy-table, age-binned and global mean imputation
//! - Target code grouping into diagnostic classes
//! - Drop-first one-hot encoding with a frozen feature schema

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod policy;
mod record;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::{CategoryLevels, FeatureSchema, LabelEncoder, OneHotEncoder};
pub use imputer::{most_frequent, AgeBins, ImputeColumn, ImputeStrategy, ImputeValue, Imputer};
pub use pipeline::{FittedPreprocessor, PreparedData, Preprocessor, UnlabeledData};
pub use policy::{DiagnosticClass, DomainRules, Sex, TargetMapping, TbgPolicy};
pub use record::{
    Lab, PatientRecord, CATEGORICAL_COLUMNS, CLASS_COLUMN, FLAG_COLUMNS, MEASURED_COLUMNS,
    NUMERIC_COLUMNS, PATIENT_ID_COLUMN, TARGET_COLUMN,
};
pub use scaler::StandardScaler;
