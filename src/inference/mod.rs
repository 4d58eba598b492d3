//! Inference module
//!
//! Labels unseen patient records with a persisted model artifact and
//! summarises the predicted class distribution.

mod predictor;

pub use predictor::{
    ClassShare, PatientPrediction, PredictionResult, Predictor, PREDICTED_CLASS_COLUMN,
};
