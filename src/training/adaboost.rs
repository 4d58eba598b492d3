//! AdaBoost (Adaptive Boosting) implementation
//!
//! SAMME boosting over weighted depth-1 trees, weighting misclassified
//! samples more heavily in subsequent rounds.

use crate::error::{Result, ThyroidError};
use super::decision_tree::DecisionTree;
use super::models::{check_fit_input, check_n_features, unique_classes, Classifier};
use super::random_forest::argmax_rows;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// AdaBoost Classifier (SAMME variant, supports multi-class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: u64,
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
    classes: Vec<i64>,
    n_features: usize,
    pub is_fitted: bool,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            random_state: 42,
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        if self.learning_rate <= 0.0 {
            return Err(ThyroidError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.classes = unique_classes(y);
        let n_classes = self.classes.len() as f64;
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.stumps.clear();
        self.alphas.clear();

        for round in 0..self.n_estimators {
            let mut stump = DecisionTree::new_classifier()
                .with_max_depth(1)
                .with_random_state(self.random_state.wrapping_add(round as u64));
            stump.fit_weighted(x, y, Some(&weights))?;
            let predictions = Classifier::predict(&stump, x)?;

            let missed: Vec<bool> = predictions
                .iter()
                .zip(y.iter())
                .map(|(p, t)| p != t)
                .collect();
            let missed_weight: f64 = weights
                .iter()
                .zip(&missed)
                .map(|(w, m)| if *m { *w } else { 0.0 })
                .sum();
            let error = missed_weight / weights.sum();

            if error <= 0.0 {
                // Perfect learner: keep it and stop
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if error >= 1.0 - 1.0 / n_classes {
                // No better than chance
                debug!(round, error, "AdaBoost stopped early");
                if self.stumps.is_empty() {
                    return Err(ThyroidError::TrainingError(
                        "first weak learner is no better than random guessing".to_string(),
                    ));
                }
                break;
            }

            // SAMME alpha for multi-class
            let alpha =
                self.learning_rate * (((1.0 - error) / error).ln() + (n_classes - 1.0).ln());

            for (w, &m) in weights.iter_mut().zip(&missed) {
                if m {
                    *w *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Weighted votes per class, columns ordered as the fitted classes
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ThyroidError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let mut votes = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            let predictions = Classifier::predict(stump, x)?;
            for (i, label) in predictions.iter().enumerate() {
                if let Ok(col) = self.classes.binary_search(label) {
                    votes[[i, col]] += alpha;
                }
            }
        }
        Ok(votes)
    }

    pub fn n_estimators_fitted(&self) -> usize {
        self.stumps.len()
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        AdaBoostClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let votes = self.decision_function(x)?;
        Ok(argmax_rows(&votes)
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
    fn test_adaboost_separable() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0, 0, 0, 1, 1, 1];

        let mut model = AdaBoostClassifier::new(10, 1.0);
        model.fit(&x, &y).unwrap();
        let preds = Classifier::predict(&model, &x).unwrap();
        assert_eq!(preds, y);
        // A perfect first stump ends boosting
        assert_eq!(model.n_estimators_fitted(), 1);
    }

    #[test]
    fn test_adaboost_multiclass() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [5.0, 0.0],
            [5.2, 0.2],
            [5.1, 0.1],
            [0.0, 5.0],
            [0.3, 5.2],
            [0.1, 5.1],
        ];
        let y = array![0, 0, 0, 1, 1, 1, 2, 2, 2];

        let mut model = AdaBoostClassifier::new(30, 0.5);
        model.fit(&x, &y).unwrap();
        let preds = Classifier::predict(&model, &x).unwrap();
        let correct = preds.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 8, "only {correct} of 9 correct");
    }

    #[test]
    fn test_not_fitted() {
        let model = AdaBoostClassifier::default();
        assert!(Classifier::predict(&model, &array![[1.0]]).is_err());
    }
}
