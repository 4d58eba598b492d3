//! Gradient Boosting implementation
//!
//! Multiclass gradient boosted regression trees on the softmax loss: each
//! round fits one tree per class to the negative gradient, then replaces its
//! leaf values with a one-step Newton estimate.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{check_fit_input, check_n_features, unique_classes, Classifier};
use super::random_forest::argmax_rows;
use crate::error::{Result, ThyroidError};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio per round
    pub subsample: f64,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    /// `trees[round][class]`
    trees: Vec<Vec<DecisionTree>>,
    /// Log prior of every class
    initial_scores: Vec<f64>,
    classes: Vec<i64>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_scores: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit the boosted ensemble
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.classes = unique_classes(y);
        let k = self.classes.len();
        if k < 2 {
            return Err(ThyroidError::TrainingError(
                "gradient boosting needs at least 2 classes".to_string(),
            ));
        }

        // One-hot targets
        let mut onehot = Array2::<f64>::zeros((n_samples, k));
        for (i, label) in y.iter().enumerate() {
            let c = self.classes.binary_search(label).unwrap_or(0);
            onehot[[i, c]] = 1.0;
        }

        self.initial_scores = onehot
            .mean_axis(Axis(0))
            .map(|p| p.mapv(|v| v.max(1e-12).ln()).to_vec())
            .unwrap_or_else(|| vec![0.0; k]);

        let mut scores = Array2::from_shape_fn((n_samples, k), |(_, c)| self.initial_scores[c]);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.feature_importances = vec![0.0; self.n_features];
        self.trees.clear();

        let shrink = (k as f64 - 1.0) / k as f64;

        for round in 0..self.config.n_estimators {
            let proba = softmax(&scores);
            let residuals = &onehot - &proba;
            let rows = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &rows);

            let round_trees: Vec<DecisionTree> = (0..k)
                .into_par_iter()
                .map(|c| -> Result<DecisionTree> {
                    let r_sub: Array1<f64> = rows.iter().map(|&i| residuals[[i, c]]).collect();
                    let mut tree = DecisionTree::new_regressor()
                        .with_max_depth(self.config.max_depth)
                        .with_min_samples_leaf(self.config.min_samples_leaf)
                        .with_random_state(self.config.random_state.wrapping_add((round * k + c) as u64));
                    tree.fit_regression(&x_sub, &r_sub)?;

                    // Newton step per leaf
                    let leaves = tree.apply(&x_sub)?;
                    let mut num = vec![0.0; tree.get_n_leaves()];
                    let mut den = vec![0.0; tree.get_n_leaves()];
                    for (&leaf, &r) in leaves.iter().zip(r_sub.iter()) {
                        num[leaf] += r;
                        den[leaf] += r.abs() * (1.0 - r.abs());
                    }
                    let values: Vec<f64> = num
                        .iter()
                        .zip(&den)
                        .map(|(&n, &d)| if d.abs() < 1e-150 { 0.0 } else { shrink * n / d })
                        .collect();
                    tree.set_leaf_values(&values)?;
                    Ok(tree)
                })
                .collect::<Result<Vec<_>>>()?;

            for (c, tree) in round_trees.iter().enumerate() {
                let update = tree.predict_values(x)?;
                scores
                    .column_mut(c)
                    .scaled_add(self.config.learning_rate, &update);
                if let Some(imp) = tree.feature_importances() {
                    for (acc, &v) in self.feature_importances.iter_mut().zip(imp.iter()) {
                        *acc += v;
                    }
                }
            }
            self.trees.push(round_trees);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.config.subsample >= 1.0 {
            return indices;
        }
        indices.shuffle(rng);
        let take = ((n as f64 * self.config.subsample).ceil() as usize).clamp(1, n);
        indices.truncate(take);
        indices.sort_unstable();
        indices
    }

    /// Raw additive scores, one column per class
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ThyroidError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let mut scores =
            Array2::from_shape_fn((x.nrows(), self.classes.len()), |(_, c)| self.initial_scores[c]);
        for round in &self.trees {
            for (c, tree) in round.iter().enumerate() {
                let update = tree.predict_values(x)?;
                scores
                    .column_mut(c)
                    .scaled_add(self.config.learning_rate, &update);
            }
        }
        Ok(scores)
    }

    /// Predict class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax(&self.decision_function(x)?))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

/// Row-wise softmax
pub(crate) fn softmax(scores: &Array2<f64>) -> Array2<f64> {
    let mut out = scores.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let scores = self.decision_function(x)?;
        Ok(argmax_rows(&scores)
            .into_iter()
            .map(|j| self.classes[j])
            .collect())
    }
}
