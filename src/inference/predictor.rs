//! Predictor implementation
//!
//! Loads a persisted artifact and labels unseen patient records with the
//! preprocessing state frozen at training time.

use crate::error::Result;
use crate::export::ModelArtifact;
use crate::preprocessing::{DiagnosticClass, DomainRules, PATIENT_ID_COLUMN};
use crate::utils::DataLoader;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Column holding the decoded class name in prediction output
pub const PREDICTED_CLASS_COLUMN: &str = "predicted_class";

/// One labelled patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientPrediction {
    pub patient_id: String,
    pub class: DiagnosticClass,
}

/// How often a class was predicted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    pub class: DiagnosticClass,
    pub count: usize,
    /// Share of all predictions, 0 to 100
    pub percentage: f64,
}

/// Output of a prediction batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions: Vec<PatientPrediction>,
    /// Records removed by the age filter
    pub n_dropped: usize,
}

impl PredictionResult {
    /// Count and percentage per predicted class, most frequent first
    pub fn distribution(&self) -> Vec<ClassShare> {
        let mut counts: BTreeMap<DiagnosticClass, usize> = BTreeMap::new();
        for p in &self.predictions {
            *counts.entry(p.class).or_insert(0) += 1;
        }
        let total = self.predictions.len().max(1) as f64;

        let mut shares: Vec<ClassShare> = counts
            .into_iter()
            .map(|(class, count)| ClassShare {
                class,
                count,
                percentage: count as f64 * 100.0 / total,
            })
            .collect();
        // Stable sort keeps class order among equal counts
        shares.sort_by(|a, b| b.count.cmp(&a.count));
        shares
    }

    /// `(patient_id, predicted_class)` table
    pub fn to_frame(&self) -> Result<DataFrame> {
        let ids: Vec<&str> = self.predictions.iter().map(|p| p.patient_id.as_str()).collect();
        let classes: Vec<&str> = self.predictions.iter().map(|p| p.class.name()).collect();
        Ok(DataFrame::new(vec![
            Column::new(PATIENT_ID_COLUMN.into(), ids),
            Column::new(PREDICTED_CLASS_COLUMN.into(), classes),
        ])?)
    }
}

/// Applies a trained artifact to raw records
pub struct Predictor {
    artifact: ModelArtifact,
    rules: DomainRules,
}

impl Predictor {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            artifact,
            rules: DomainRules::standard(),
        }
    }

    /// Load and validate an artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ModelArtifact::load(path)?))
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Label every record of a raw frame; a `target` column, if any, is ignored
    pub fn predict_frame(&self, df: &DataFrame) -> Result<PredictionResult> {
        let start = Instant::now();
        let prepared = self.artifact.preprocessor.transform(&self.rules, df)?;
        let codes = self.artifact.classifier().predict(&prepared.features)?;
        let labels = &self.artifact.preprocessor.schema().labels;

        let predictions: Vec<PatientPrediction> = prepared
            .patient_ids
            .into_iter()
            .zip(codes.iter())
            .map(|(patient_id, &code)| PatientPrediction {
                patient_id,
                class: labels.decode(code),
            })
            .collect();

        info!(
            model = %self.artifact.metadata.name,
            predicted = predictions.len(),
            dropped = prepared.n_dropped,
            secs = start.elapsed().as_secs_f64(),
            "batch predicted"
        );

        Ok(PredictionResult {
            predictions,
            n_dropped: prepared.n_dropped,
        })
    }

    /// Load a CSV and label it
    pub fn predict_csv(&self, path: impl AsRef<Path>) -> Result<PredictionResult> {
        let df = DataLoader::new().load_csv(path)?;
        self.predict_frame(&df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(classes: &[DiagnosticClass]) -> PredictionResult {
        PredictionResult {
            predictions: classes
                .iter()
                .enumerate()
                .map(|(i, &class)| PatientPrediction {
                    patient_id: format!("p{i}"),
                    class,
                })
                .collect(),
            n_dropped: 0,
        }
    }

    #[test]
    fn test_distribution_counts_and_order() {
        let r = result(&[
            DiagnosticClass::Hypothyroid,
            DiagnosticClass::NoCondition,
            DiagnosticClass::NoCondition,
            DiagnosticClass::NoCondition,
        ]);
        let dist = r.distribution();
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].class, DiagnosticClass::NoCondition);
        assert_eq!(dist[0].count, 3);
        assert!((dist[0].percentage - 75.0).abs() < 1e-12);
        assert!((dist[1].percentage - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_to_frame() {
        let r = result(&[DiagnosticClass::Hyperthyroid, DiagnosticClass::Other]);
        let df = r.to_frame().unwrap();
        assert_eq!(df.shape(), (2, 2));
        let classes = df.column(PREDICTED_CLASS_COLUMN).unwrap().str().unwrap();
        assert_eq!(classes.get(0), Some("Hyperthyroid"));
        assert_eq!(classes.get(1), Some("Other"));
    }

    #[test]
    fn test_empty_distribution() {
        assert!(result(&[]).distribution().is_empty());
    }
}
