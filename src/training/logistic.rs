//! Multinomial logistic regression
//!
//! Softmax regression trained by full-batch gradient descent with an L2
//! penalty. Inputs are standardised internally, so callers pass raw features.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gradient_boosting::softmax;
use super::models::{check_fit_input, check_n_features, unique_classes, Classifier};
use super::random_forest::argmax_rows;
use crate::error::{Result, ThyroidError};
use crate::preprocessing::StandardScaler;

/// Logistic Regression classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients, one column per class
    pub coefficients: Option<Array2<f64>>,
    /// Fitted intercept per class
    pub intercept: Option<Array1<f64>>,
    /// L2 regularization strength
    pub alpha: f64,
    /// Maximum gradient steps
    pub max_iter: usize,
    /// Gradient norm at which fitting stops
    pub tol: f64,
    pub learning_rate: f64,
    scaler: StandardScaler,
    classes: Vec<i64>,
    n_iter: usize,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 1e-4,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.5,
            scaler: StandardScaler::new(),
            classes: Vec::new(),
            n_iter: 0,
            is_fitted: false,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Fit the model using gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        self.classes = unique_classes(y);
        if self.classes.len() < 2 {
            return Err(ThyroidError::TrainingError(
                "logistic regression needs at least 2 classes".to_string(),
            ));
        }

        let xs = self.scaler.fit_transform(x)?;
        let n_samples = xs.nrows() as f64;
        let k = self.classes.len();

        let mut onehot = Array2::<f64>::zeros((xs.nrows(), k));
        for (i, label) in y.iter().enumerate() {
            let c = self.classes.binary_search(label).unwrap_or(0);
            onehot[[i, c]] = 1.0;
        }

        let mut weights = Array2::<f64>::zeros((xs.ncols(), k));
        let mut bias = Array1::<f64>::zeros(k);
        let lr = self.learning_rate;

        self.n_iter = self.max_iter;
        for iter in 0..self.max_iter {
            // Forward pass
            let proba = softmax(&(xs.dot(&weights) + &bias));

            // Compute gradients
            let errors = &proba - &onehot;
            let dw = xs.t().dot(&errors) / n_samples + &weights * self.alpha;
            let db = errors.sum_axis(Axis(0)) / n_samples;

            // Check convergence
            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                self.n_iter = iter;
                break;
            }

            weights.scaled_add(-lr, &dw);
            bias.scaled_add(-lr, &db);
        }
        debug!(iterations = self.n_iter, "logistic regression converged");

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.is_fitted = true;

        Ok(self)
    }

    /// Predict probabilities, columns ordered as the fitted classes
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (coefficients, intercept) = match (&self.coefficients, &self.intercept) {
            (Some(c), Some(b)) if self.is_fitted => (c, b),
            _ => return Err(ThyroidError::ModelNotFitted),
        };
        check_n_features(coefficients.nrows(), x)?;

        let xs = self.scaler.transform(x)?;
        Ok(softmax(&(xs.dot(coefficients) + intercept)))
    }

    /// Gradient steps taken by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let proba = self.predict_proba(x)?;
        Ok(argmax_rows(&proba)
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
    fn test_logistic_regression() {
        let x = array![
            [1.0, 200.0],
            [2.0, 210.0],
            [3.0, 190.0],
            [7.0, 205.0],
            [8.0, 195.0],
            [9.0, 200.0],
        ];
        let y = array![0, 0, 0, 1, 1, 1];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let predictions = Classifier::predict(&model, &x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_multinomial_proba() {
        let x = array![[0.0], [0.5], [5.0], [5.5], [10.0], [10.5]];
        let y = array![4, 4, 5, 5, 6, 6];

        let mut model = LogisticRegression::new().with_max_iter(2000);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let predictions = Classifier::predict(&model, &array![[0.2], [10.2]]).unwrap();
        assert_eq!(predictions, array![4, 6]);
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        assert!(model.predict_proba(&array![[1.0]]).is_err());
    }
}
