//! Class balancing
//!
//! Provides resampling techniques for imbalanced training partitions:
//! - SMOTE (Synthetic Minority Over-sampling Technique)
//! - Edited Nearest Neighbours cleaning
//! - SMOTEENN, the two chained

mod combine;
mod enn;
mod smote;

pub use combine::SMOTEENN;
pub use enn::EditedNearestNeighbours;
pub use smote::SMOTE;

use crate::error::Result;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Resampled features
    pub x: Array2<f64>,
    /// Resampled labels
    pub y: Array1<i64>,
    /// Number of synthetic samples generated per class, in class order
    pub n_synthetic: Vec<usize>,
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Get class distribution, ordered by class code
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Get indices for each class, ordered by class code
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}

/// Largest class count over smallest class count (1.0 for a single class)
pub fn imbalance_ratio(y: &Array1<i64>) -> f64 {
    let counts = class_counts(y);
    let max = counts.values().copied().max().unwrap_or(0);
    let min = counts.values().copied().min().unwrap_or(0);
    if min == 0 {
        return 1.0;
    }
    max as f64 / min as f64
}

/// Squared Euclidean distance between two rows
pub(crate) fn squared_distance(a: ndarray::ArrayView1<f64>, b: ndarray::ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_class_counts_ordered() {
        let y = array![3, 1, 3, 0, 3];
        let counts: Vec<(i64, usize)> = class_counts(&y).into_iter().collect();
        assert_eq!(counts, vec![(0, 1), (1, 1), (3, 3)]);
    }

    #[test]
    fn test_imbalance_ratio() {
        assert_eq!(imbalance_ratio(&array![0, 0, 0, 0, 1, 1]), 2.0);
        assert_eq!(imbalance_ratio(&array![2, 2]), 1.0);
    }
}
