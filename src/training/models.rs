//! Classifier trait and evaluation metrics

use crate::error::{Result, ThyroidError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Trait for multiclass classifiers over dense class codes
pub trait Classifier: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Predict a class code per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>>;
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: i64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Metrics for model evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    /// Support-weighted mean of per-class F1
    pub weighted_f1: f64,
    /// Unweighted mean of per-class F1
    pub macro_f1: f64,
    /// One entry per label in `labels`
    pub per_class: Vec<ClassMetrics>,
    /// Sorted union of true and predicted labels
    pub labels: Vec<i64>,
    /// `confusion_matrix[t][p]` counts rows with true `labels[t]` predicted as `labels[p]`
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute classification metrics
    pub fn compute(y_true: &Array1<i64>, y_pred: &Array1<i64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(ThyroidError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(ThyroidError::EmptyInput("no samples to evaluate".to_string()));
        }

        let labels: Vec<i64> = y_true
            .iter()
            .chain(y_pred.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position = |label: i64| labels.binary_search(&label).unwrap_or(0);

        let k = labels.len();
        let mut confusion = vec![vec![0usize; k]; k];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            confusion[position(t)][position(p)] += 1;
        }

        let n = y_true.len();
        let correct: usize = (0..k).map(|i| confusion[i][i]).sum();

        let per_class: Vec<ClassMetrics> = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let tp = confusion[i][i] as f64;
                let support: usize = confusion[i].iter().sum();
                let predicted: usize = confusion.iter().map(|row| row[i]).sum();

                // Undefined ratios count as zero
                let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
                let recall = if support > 0 { tp / support as f64 } else { 0.0 };
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let weighted_f1 = per_class
            .iter()
            .map(|c| c.f1 * c.support as f64)
            .sum::<f64>()
            / n as f64;
        let macro_f1 = per_class.iter().map(|c| c.f1).sum::<f64>() / k as f64;

        Ok(Self {
            accuracy: correct as f64 / n as f64,
            weighted_f1,
            macro_f1,
            per_class,
            labels,
            confusion_matrix: confusion,
            n_samples: n,
        })
    }
}

/// Validate matching row counts and a non-empty training set
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ThyroidError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(ThyroidError::EmptyInput("no training samples".to_string()));
    }
    Ok(())
}

/// Sorted distinct labels
pub(crate) fn unique_classes(y: &Array1<i64>) -> Vec<i64> {
    y.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Reject matrices whose width differs from the fitted one
pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(ThyroidError::ShapeError {
            expected: format!("{expected} features"),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}
