//! Decision tree implementation

use crate::error::{Result, ThyroidError};
use super::models::{check_fit_input, check_n_features, unique_classes, Classifier};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        /// Depth-first leaf number
        id: usize,
        /// Class index (classification) or mean target (regression)
        value: f64,
        /// Weighted class proportions; empty for regression
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Targets of the current fit, already mapped to class indices
enum Targets {
    Classes { y: Vec<usize>, n_classes: usize },
    Values(Vec<f64>),
}

/// Weighted sufficient statistics of a node
#[derive(Clone)]
struct NodeStats {
    weight: f64,
    count: usize,
    class_weights: Vec<f64>,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn empty(n_classes: usize) -> Self {
        Self {
            weight: 0.0,
            count: 0,
            class_weights: vec![0.0; n_classes],
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn add(&mut self, targets: &Targets, i: usize, w: f64) {
        self.weight += w;
        self.count += 1;
        match targets {
            Targets::Classes { y, .. } => self.class_weights[y[i]] += w,
            Targets::Values(v) => {
                self.sum += w * v[i];
                self.sq_sum += w * v[i] * v[i];
            }
        }
    }

    fn remove(&mut self, targets: &Targets, i: usize, w: f64) {
        self.weight -= w;
        self.count -= 1;
        match targets {
            Targets::Classes { y, .. } => self.class_weights[y[i]] -= w,
            Targets::Values(v) => {
                self.sum -= w * v[i];
                self.sq_sum -= w * v[i] * v[i];
            }
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_weights
                    .iter()
                    .map(|&c| (c / self.weight).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -self
                .class_weights
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| {
                    let p = c / self.weight;
                    p * p.ln()
                })
                .sum::<f64>(),
            Criterion::MSE => {
                let mean = self.sum / self.weight;
                (self.sq_sum / self.weight - mean * mean).max(0.0)
            }
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random per node; all when `None`
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for per-node feature sampling
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Is classification task
    is_classification: bool,
    /// Classes (for classification)
    classes: Vec<i64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set the number of features considered per split
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n.max(1));
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Classes seen during fitting, sorted
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Fit a classification tree, optionally with per-sample weights
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        if !self.is_classification {
            return Err(ThyroidError::InvalidParameter {
                name: "criterion".to_string(),
                value: format!("{:?}", self.criterion),
                reason: "regression trees are fitted with fit_regression".to_string(),
            });
        }

        self.classes = unique_classes(y);
        let codes = y
            .iter()
            .map(|c| self.classes.binary_search(c).unwrap_or(0))
            .collect();
        let targets = Targets::Classes {
            y: codes,
            n_classes: self.classes.len(),
        };
        self.fit_targets(x, targets, sample_weight)
    }

    /// Fit a regression tree
    pub fn fit_regression(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(ThyroidError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.is_classification {
            return Err(ThyroidError::InvalidParameter {
                name: "criterion".to_string(),
                value: format!("{:?}", self.criterion),
                reason: "classification trees are fitted with fit_weighted".to_string(),
            });
        }
        self.fit_targets(x, Targets::Values(y.to_vec()), None)
    }

    fn fit_targets(
        &mut self,
        x: &Array2<f64>,
        targets: Targets,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples == 0 {
            return Err(ThyroidError::EmptyInput("no training samples".to_string()));
        }

        let weights: Vec<f64> = match sample_weight {
            Some(w) if w.len() == n_samples => w.to_vec(),
            Some(w) => {
                return Err(ThyroidError::ShapeError {
                    expected: format!("{n_samples} sample weights"),
                    actual: format!("{} sample weights", w.len()),
                })
            }
            None => vec![1.0; n_samples],
        };

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);

        let indices: Vec<usize> = (0..n_samples).collect();
        let ctx = FitContext {
            x,
            targets: &targets,
            weights: &weights,
        };
        let mut root = self.build_tree(&ctx, &indices, 0, &mut importances, &mut rng);
        number_leaves(&mut root, &mut 0);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn node_stats(&self, ctx: &FitContext, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::empty(ctx.n_classes());
        for &i in indices {
            stats.add(ctx.targets, i, ctx.weights[i]);
        }
        stats
    }

    fn make_leaf(&self, stats: &NodeStats) -> TreeNode {
        if self.is_classification {
            let distribution: Vec<f64> = if stats.weight > 0.0 {
                stats.class_weights.iter().map(|&c| c / stats.weight).collect()
            } else {
                vec![0.0; stats.class_weights.len()]
            };
            // First maximum wins, so ties go to the lowest class
            let value = distribution
                .iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |best, (i, &p)| {
                    if p > best.1 {
                        (i, p)
                    } else {
                        best
                    }
                })
                .0 as f64;
            TreeNode::Leaf {
                id: 0,
                value,
                distribution,
                n_samples: stats.count,
            }
        } else {
            let value = if stats.weight > 0.0 { stats.sum / stats.weight } else { 0.0 };
            TreeNode::Leaf {
                id: 0,
                value,
                distribution: Vec::new(),
                n_samples: stats.count,
            }
        }
    }

    fn build_tree(
        &self,
        ctx: &FitContext,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut Xoshiro256PlusPlus,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(ctx, indices);
        let parent_impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_impurity <= 1e-12;

        if should_stop {
            return self.make_leaf(&stats);
        }

        let features = self.candidate_features(rng);
        let best = self.find_best_split(ctx, indices, &stats, parent_impurity, &features);

        let Some((feature, threshold, gain)) = best else {
            return self.make_leaf(&stats);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, feature]] <= threshold);

        importances[feature] += stats.weight * gain;

        let left = Box::new(self.build_tree(ctx, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(ctx, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn candidate_features(&self, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        match self.max_features {
            Some(k) if k < self.n_features => {
                features.shuffle(rng);
                features.truncate(k);
                features.sort_unstable();
                features
            }
            _ => features,
        }
    }

    /// Sort-and-sweep search over the candidate features
    fn find_best_split(
        &self,
        ctx: &FitContext,
        indices: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
        features: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature| {
                let mut order = indices.to_vec();
                order.sort_by(|&a, &b| {
                    ctx.x[[a, feature]]
                        .partial_cmp(&ctx.x[[b, feature]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = NodeStats::empty(ctx.n_classes());
                let mut right = parent.clone();
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..order.len() - 1 {
                    let i = order[pos];
                    left.add(ctx.targets, i, ctx.weights[i]);
                    right.remove(ctx.targets, i, ctx.weights[i]);

                    let here = ctx.x[[i, feature]];
                    let next = ctx.x[[order[pos + 1], feature]];
                    if next <= here {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }
                    if left.weight <= 0.0 || right.weight <= 0.0 {
                        continue;
                    }

                    let weighted = (left.weight * left.impurity(self.criterion)
                        + right.weight * right.impurity(self.criterion))
                        / parent.weight;
                    let gain = parent_impurity - weighted;
                    if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (here + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature, threshold, gain))
            })
            .collect();

        // Earliest feature wins ties
        feature_results.into_iter().flatten().fold(None, |acc, cand| match acc {
            Some((_, _, g)) if cand.2 <= g => acc,
            _ => Some(cand),
        })
    }

    fn leaf_for<'a>(&'a self, node: &'a TreeNode, sample: ndarray::ArrayView1<f64>) -> &'a TreeNode {
        match node {
            TreeNode::Leaf { .. } => node,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    self.leaf_for(left, sample)
                } else {
                    self.leaf_for(right, sample)
                }
            }
        }
    }

    fn fitted_root(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(ThyroidError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;
        Ok(root)
    }

    /// Raw leaf values: class index for classifiers, mean target for regressors
    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.fitted_root(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match self.leaf_for(root, row) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => 0.0,
            })
            .collect())
    }

    /// Class probabilities, columns ordered as [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classification {
            return Err(ThyroidError::InvalidParameter {
                name: "criterion".to_string(),
                value: format!("{:?}", self.criterion),
                reason: "probabilities need a classification tree".to_string(),
            });
        }
        let root = self.fitted_root(x)?;
        let mut out = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            if let TreeNode::Leaf { distribution, .. } = self.leaf_for(root, row) {
                for (j, &p) in distribution.iter().enumerate() {
                    out[[i, j]] = p;
                }
            }
        }
        Ok(out)
    }

    /// Depth-first number of the leaf each row lands in
    pub fn apply(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.fitted_root(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match self.leaf_for(root, row) {
                TreeNode::Leaf { id, .. } => *id,
                TreeNode::Split { .. } => 0,
            })
            .collect())
    }

    /// Overwrite leaf values, indexed by depth-first leaf number
    pub fn set_leaf_values(&mut self, values: &[f64]) -> Result<()> {
        fn assign(node: &mut TreeNode, values: &[f64]) {
            match node {
                TreeNode::Leaf { id, value, .. } => {
                    if let Some(&v) = values.get(*id) {
                        *value = v;
                    }
                }
                TreeNode::Split { left, right, .. } => {
                    assign(left, values);
                    assign(right, values);
                }
            }
        }

        let n_leaves = self.get_n_leaves();
        let root = self.root.as_mut().ok_or(ThyroidError::ModelNotFitted)?;
        if values.len() != n_leaves {
            return Err(ThyroidError::ShapeError {
                expected: format!("{n_leaves} leaf values"),
                actual: format!("{} leaf values", values.len()),
            });
        }
        assign(root, values);
        Ok(())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

fn number_leaves(node: &mut TreeNode, next: &mut usize) {
    match node {
        TreeNode::Leaf { id, .. } => {
            *id = *next;
            *next += 1;
        }
        TreeNode::Split { left, right, .. } => {
            number_leaves(left, next);
            number_leaves(right, next);
        }
    }
}

struct FitContext<'a> {
    x: &'a Array2<f64>,
    targets: &'a Targets,
    weights: &'a [f64],
}

impl FitContext<'_> {
    fn n_classes(&self) -> usize {
        match self.targets {
            Targets::Classes { n_classes, .. } => *n_classes,
            Targets::Values(_) => 0,
        }
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        self.fit_weighted(x, y, None).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let values = self.predict_values(x)?;
        Ok(values.mapv(|v| self.classes.get(v as usize).copied().unwrap_or_default()))
    }
}
