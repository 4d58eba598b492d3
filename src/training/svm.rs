//! Support Vector Machine implementation
//!
//! Linear SVM classifier trained with the Pegasos stochastic sub-gradient
//! solver. Multi-class problems use one-vs-rest, one binary model per class
//! trained in parallel. Features are standardised internally.

use crate::error::{Result, ThyroidError};
use crate::preprocessing::StandardScaler;
use super::models::{check_fit_input, check_n_features, unique_classes, Classifier};
use super::random_forest::argmax_rows;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Passes over the training data
    pub max_epochs: usize,
    /// Random seed
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_epochs: 50,
            random_state: 42,
        }
    }
}

/// A single binary SVM trained for one class vs rest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySVM {
    weights: Array1<f64>,
    bias: f64,
}

impl BinarySVM {
    fn decision(&self, row: ArrayView1<f64>) -> f64 {
        row.dot(&self.weights) + self.bias
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    scaler: StandardScaler,
    /// Unique class labels
    classes: Vec<i64>,
    /// One-vs-Rest binary classifiers
    ovr_classifiers: Vec<BinarySVM>,
    n_features: usize,
    is_fitted: bool,
}

impl Default for SVMClassifier {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl SVMClassifier {
    /// Create a new SVM classifier
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            scaler: StandardScaler::new(),
            classes: Vec::new(),
            ovr_classifiers: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Fit the classifier
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.c <= 0.0 {
            return Err(ThyroidError::InvalidParameter {
                name: "c".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        self.classes = unique_classes(y);
        if self.classes.len() < 2 {
            return Err(ThyroidError::TrainingError(
                "SVM needs at least 2 classes".to_string(),
            ));
        }
        self.n_features = x.ncols();
        let xs = self.scaler.fit_transform(x)?;

        // Binary problems need a single separator
        let targets: Vec<i64> = if self.classes.len() == 2 {
            vec![self.classes[1]]
        } else {
            self.classes.clone()
        };

        self.ovr_classifiers = targets
            .par_iter()
            .enumerate()
            .map(|(idx, &class)| {
                let signs: Vec<f64> = y
                    .iter()
                    .map(|&label| if label == class { 1.0 } else { -1.0 })
                    .collect();
                let seed = self.config.random_state.wrapping_add(idx as u64);
                self.fit_binary(&xs, &signs, seed)
            })
            .collect();

        self.is_fitted = true;
        Ok(())
    }

    /// Pegasos with the bias folded in as a constant feature
    fn fit_binary(&self, x: &Array2<f64>, signs: &[f64], seed: u64) -> BinarySVM {
        let n = x.nrows();
        let lambda = 1.0 / (self.config.c * n as f64);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;
        let mut order: Vec<usize> = (0..n).collect();
        let mut t = 0usize;

        for _ in 0..self.config.max_epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                t += 1;
                let eta = 1.0 / (lambda * t as f64);
                let row = x.row(i);
                let margin = signs[i] * (row.dot(&weights) + bias);

                weights *= 1.0 - eta * lambda;
                bias *= 1.0 - eta * lambda;
                if margin < 1.0 {
                    weights.scaled_add(eta * signs[i], &row);
                    bias += eta * signs[i];
                }

                // Project onto the ball of radius 1/sqrt(lambda)
                let norm = (weights.dot(&weights) + bias * bias).sqrt();
                let radius = 1.0 / lambda.sqrt();
                if norm > radius {
                    let shrink = radius / norm;
                    weights *= shrink;
                    bias *= shrink;
                }
            }
        }

        BinarySVM { weights, bias }
    }

    /// Decision value per row and class
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ThyroidError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;
        let xs = self.scaler.transform(x)?;

        let scores = if self.ovr_classifiers.len() == 1 {
            let svm = &self.ovr_classifiers[0];
            Array2::from_shape_fn((xs.nrows(), 2), |(i, j)| {
                let d = svm.decision(xs.row(i));
                if j == 1 { d } else { -d }
            })
        } else {
            Array2::from_shape_fn((xs.nrows(), self.ovr_classifiers.len()), |(i, j)| {
                self.ovr_classifiers[j].decision(xs.row(i))
            })
        };
        Ok(scores)
    }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        SVMClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let scores = self.decision_function(x)?;
        Ok(argmax_rows(&scores)
            .into_iter()
            .map(|j| self.classes[j])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_separable() {
        let x = array![
            [0.0, 0.0],
            [0.5, 0.2],
            [0.2, 0.6],
            [5.0, 5.0],
            [5.5, 4.8],
            [4.8, 5.3],
        ];
        let y = array![1, 1, 1, 7, 7, 7];

        let mut svm = SVMClassifier::default();
        svm.fit(&x, &y).unwrap();
        assert_eq!(Classifier::predict(&svm, &x).unwrap(), y);
    }

    #[test]
    fn test_multiclass_ovr() {
        let x = array![
            [0.0, 0.0],
            [0.3, 0.1],
            [0.1, 0.2],
            [6.0, 0.0],
            [6.2, 0.3],
            [5.9, 0.1],
            [0.0, 6.0],
            [0.2, 6.1],
            [0.1, 5.8],
        ];
        let y = array![0, 0, 0, 1, 1, 1, 2, 2, 2];

        let mut svm = SVMClassifier::new(SVMConfig {
            c: 10.0,
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();
        assert_eq!(Classifier::predict(&svm, &x).unwrap(), y);
        assert_eq!(svm.decision_function(&x).unwrap().ncols(), 3);
    }

    #[test]
    fn test_invalid_c() {
        let mut svm = SVMClassifier::new(SVMConfig {
            c: 0.0,
            ..Default::default()
        });
        assert!(svm.fit(&array![[0.0], [1.0]], &array![0, 1]).is_err());
    }
}
