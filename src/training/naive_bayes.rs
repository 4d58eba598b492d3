//! Naive Bayes classifiers
//!
//! Implements Gaussian Naive Bayes for continuous features.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::models::{check_fit_input, check_n_features, unique_classes, Classifier};
use super::random_forest::argmax_rows;
use crate::error::{Result, ThyroidError};

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Mean of each feature, one row per class
    means: Array2<f64>,
    /// Variance of each feature, one row per class
    variances: Array2<f64>,
    /// Log prior probability of each class
    log_priors: Vec<f64>,
    /// List of classes
    classes: Vec<i64>,
    /// Portion of the largest feature variance added to every variance
    var_smoothing: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            means: Array2::zeros((0, 0)),
            variances: Array2::zeros((0, 0)),
            log_priors: Vec::new(),
            classes: Vec::new(),
            var_smoothing: 1e-9,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Fit the classifier
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.classes = unique_classes(y);
        let n_classes = self.classes.len();

        let epsilon = self.var_smoothing
            * x.var_axis(Axis(0), 0.0)
                .iter()
                .fold(0.0f64, |m, &v| m.max(v));

        self.means = Array2::zeros((n_classes, n_features));
        self.variances = Array2::zeros((n_classes, n_features));
        self.log_priors = Vec::with_capacity(n_classes);

        for (c, &class) in self.classes.iter().enumerate() {
            let rows: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, label)| **label == class)
                .map(|(i, _)| i)
                .collect();

            // Single-pass Welford's algorithm for mean and variance
            let mut mean = vec![0.0; n_features];
            let mut m2 = vec![0.0; n_features];
            for (count, &idx) in rows.iter().enumerate() {
                let count = (count + 1) as f64;
                for (j, &val) in x.row(idx).iter().enumerate() {
                    let delta = val - mean[j];
                    mean[j] += delta / count;
                    m2[j] += delta * (val - mean[j]);
                }
            }

            let n_class = rows.len() as f64;
            for j in 0..n_features {
                self.means[[c, j]] = mean[j];
                self.variances[[c, j]] = m2[j] / n_class + epsilon;
            }
            self.log_priors.push((n_class / n_samples as f64).ln());
        }

        // Constant features in every class still need a positive variance
        if self.variances.iter().any(|&v| v <= 0.0) {
            self.variances.mapv_inplace(|v| if v <= 0.0 { 1e-9 } else { v });
        }

        Ok(())
    }

    /// Unnormalised joint log likelihood, one column per class
    fn joint_log_likelihood(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.classes.is_empty() {
            return Err(ThyroidError::ModelNotFitted);
        }
        check_n_features(self.means.ncols(), x)?;

        let mut out = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for c in 0..self.classes.len() {
                let mut ll = self.log_priors[c];
                for (j, &val) in row.iter().enumerate() {
                    let var = self.variances[[c, j]];
                    let diff = val - self.means[[c, j]];
                    ll -= 0.5 * ((2.0 * PI * var).ln() + diff * diff / var);
                }
                out[[i, c]] = ll;
            }
        }
        Ok(out)
    }

    /// Predict log probabilities
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut jll = self.joint_log_likelihood(x)?;
        for mut row in jll.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            let log_sum = max + row.mapv(|v| (v - max).exp()).sum().ln();
            row.mapv_inplace(|v| v - log_sum);
        }
        Ok(jll)
    }

    /// Predict class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_log_proba(x)?.mapv(f64::exp))
    }

    /// Class priors in class order
    pub fn class_priors(&self) -> Vec<f64> {
        self.log_priors.iter().map(|lp| lp.exp()).collect()
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }
}

impl Classifier for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        GaussianNaiveBayes::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let jll = self.joint_log_likelihood(x)?;
        Ok(argmax_rows(&jll)
            .into_iter()
            .map(|j| self.classes[j])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classification_data() -> (Array2<f64>, Array1<i64>) {
        // Two well-separated Gaussian clusters
        let x = Array2::from_shape_vec((20, 2), vec![
            // Class 0 (centered around 0, 0)
            -1.0, -1.0, -0.5, -0.5, 0.0, 0.0, 0.5, 0.5, -1.0, 0.0,
            -0.5, 0.5, 0.0, -0.5, 0.5, -1.0, -0.2, -0.8, -0.8, -0.2,
            // Class 1 (centered around 5, 5)
            4.0, 4.0, 4.5, 4.5, 5.0, 5.0, 5.5, 5.5, 4.0, 5.0,
            4.5, 5.5, 5.0, 4.5, 5.5, 4.0, 4.2, 4.8, 4.8, 4.2,
        ]).unwrap();

        let y = Array1::from_vec(vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3]);

        (x, y)
    }

    #[test]
    fn test_gaussian_naive_bayes() {
        let (x, y) = create_classification_data();

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        let predictions = Classifier::predict(&nb, &x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_gaussian_proba() {
        let (x, y) = create_classification_data();

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        let proba = nb.predict_proba(&x).unwrap();
        for row in proba.rows() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "Probabilities should sum to 1, got {}", sum);
        }
    }

    #[test]
    fn test_class_priors() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 0.1, 0.2, 5.0]).unwrap();
        let y = Array1::from_vec(vec![1, 1, 1, 2]);

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        let priors = nb.class_priors();
        assert!((priors[0] - 0.75).abs() < 1e-12);
        assert!((priors[1] - 0.25).abs() < 1e-12);
        assert_eq!(nb.classes(), &[1, 2]);
    }

    #[test]
    fn test_constant_feature() {
        let x = Array2::from_shape_vec((4, 2), vec![1.0, 0.0, 1.0, 0.1, 1.0, 3.0, 1.0, 3.1]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 1, 1]);

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        let predictions = Classifier::predict(&nb, &x).unwrap();
        assert_eq!(predictions, y);
    }
}
