//! Edited Nearest Neighbours undersampling

use crate::error::{Result, ThyroidError};
use crate::synthetic::smote::k_nearest;
use crate::synthetic::{class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Removes samples whose neighbourhood disagrees with their label.
///
/// A sample is kept only when all of its `n_neighbors` nearest neighbours
/// share its class. A class whose every sample would be removed is kept whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditedNearestNeighbours {
    n_neighbors: usize,
    is_fitted: bool,
}

impl EditedNearestNeighbours {
    pub fn new() -> Self {
        Self {
            n_neighbors: 3,
            is_fitted: false,
        }
    }

    /// Set neighbourhood size
    pub fn with_n_neighbors(mut self, k: usize) -> Self {
        self.n_neighbors = k.max(1);
        self
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Per-row keep mask
    fn keep_mask(&self, x: &Array2<f64>, y: &Array1<i64>) -> Vec<bool> {
        let k = self.n_neighbors.min(x.nrows().saturating_sub(1));
        if k == 0 {
            return vec![true; x.nrows()];
        }

        let mut keep: Vec<bool> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                k_nearest(x.row(i), x.rows().into_iter().enumerate(), i, k)
                    .into_iter()
                    .all(|j| y[j] == y[i])
            })
            .collect();

        for (class, idx) in class_indices(y) {
            if idx.iter().all(|&i| !keep[i]) {
                debug!(class, "every sample flagged, class kept whole");
                for i in idx {
                    keep[i] = true;
                }
            }
        }
        keep
    }
}

impl Default for EditedNearestNeighbours {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for EditedNearestNeighbours {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ThyroidError::ShapeError {
                expected: format!("{} rows", y.len()),
                actual: format!("{} rows", x.nrows()),
            });
        }
        self.is_fitted = true;
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        if !self.is_fitted {
            return Err(ThyroidError::ModelNotFitted);
        }

        let keep = self.keep_mask(x, y);
        let kept: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();

        debug!(removed = x.nrows() - kept.len(), kept = kept.len(), "ENN cleaning");

        Ok(ResampleResult {
            x: x.select(Axis(0), &kept),
            y: y.select(Axis(0), &kept),
            n_synthetic: vec![0; class_indices(y).len()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::class_counts;
    use ndarray::array;

    #[test]
    fn test_removes_noisy_sample() {
        // A class-1 point sitting inside the class-0 cluster
        let x = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [0.1, 0.1],
            [0.05, 0.05],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [5.1, 5.1]
        ];
        let y = array![0, 0, 0, 0, 1, 1, 1, 1, 1];

        let result = EditedNearestNeighbours::new().fit_resample(&x, &y).unwrap();
        let counts = class_counts(&result.y);
        assert_eq!(counts[&1], 4);
        assert!(result.x.rows().into_iter().all(|r| r[0] != 0.05));
    }

    #[test]
    fn test_class_never_removed_entirely() {
        let x = array![[0.0], [0.1], [0.2], [0.3], [0.15]];
        let y = array![0, 0, 0, 0, 1];

        let result = EditedNearestNeighbours::new().fit_resample(&x, &y).unwrap();
        let counts = class_counts(&result.y);
        assert_eq!(counts.get(&1), Some(&1));
    }

    #[test]
    fn test_resample_before_fit() {
        let enn = EditedNearestNeighbours::new();
        assert!(enn.resample(&array![[0.0]], &array![0]).is_err());
    }
}
