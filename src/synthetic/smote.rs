//! SMOTE oversampling

use crate::error::{Result, ThyroidError};
use crate::synthetic::{class_counts, class_indices, squared_distance, ResampleResult, Sampler};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, warn};

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
pub(crate) struct DistIdx(pub f64, pub usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        // Index breaks distance ties so neighbour sets are reproducible
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// Indices of the `k` rows of `candidates` nearest to `point`, excluding
/// `exclude`, closest first
pub(crate) fn k_nearest<'a>(
    point: ArrayView1<f64>,
    candidates: impl Iterator<Item = (usize, ArrayView1<'a, f64>)>,
    exclude: usize,
    k: usize,
) -> Vec<usize> {
    let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
    for (i, row) in candidates {
        if i == exclude {
            continue;
        }
        let candidate = DistIdx(squared_distance(point, row), i);
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }
    heap.into_sorted_vec().into_iter().map(|DistIdx(_, i)| i).collect()
}

/// SMOTE (Synthetic Minority Over-sampling Technique)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Random seed
    seed: u64,
    /// Target samples per class
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    /// Create new SMOTE sampler
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    /// Generate synthetic sample between two points
    fn generate_sample(point: ArrayView1<f64>, neighbor: ArrayView1<f64>, rng: &mut StdRng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);

        if counts.len() < 2 {
            return Err(ThyroidError::InvalidParameter {
                name: "y".to_string(),
                value: format!("{} class(es)", counts.len()),
                reason: "SMOTE needs at least 2 classes".to_string(),
            });
        }

        // Every class is raised to the majority count
        let target = counts.values().copied().max().unwrap_or(0);

        let targets = counts
            .iter()
            .map(|(&class, &count)| (class, target.max(count)))
            .collect();

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self.target_counts.as_ref().ok_or(ThyroidError::ModelNotFitted)?;
        if x.nrows() != y.len() {
            return Err(ThyroidError::ShapeError {
                expected: format!("{} rows", y.len()),
                actual: format!("{} rows", x.nrows()),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let indices = class_indices(y);
        let n_features = x.ncols();

        // Collect only synthetic samples (original data reused from x directly)
        let mut synthetic_x: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic = Vec::with_capacity(targets.len());

        for (&class, &target_count) in targets {
            let class_idx = match indices.get(&class) {
                Some(idx) => idx,
                None => {
                    n_synthetic.push(0);
                    continue;
                }
            };
            let n_to_generate = target_count.saturating_sub(class_idx.len());

            if n_to_generate == 0 {
                n_synthetic.push(0);
                continue;
            }
            if class_idx.len() < 2 {
                warn!(class, samples = class_idx.len(), "too few samples to interpolate, class left as is");
                n_synthetic.push(0);
                continue;
            }

            let k = self.k_neighbors.min(class_idx.len() - 1);

            // Neighbour lists within the class, computed once per sample
            let neighbors: Vec<Vec<usize>> = class_idx
                .par_iter()
                .map(|&i| {
                    k_nearest(
                        x.row(i),
                        class_idx.iter().map(|&j| (j, x.row(j))),
                        i,
                        k,
                    )
                })
                .collect();

            for _ in 0..n_to_generate {
                let pick = rng.gen_range(0..class_idx.len());
                let neighbor = neighbors[pick][rng.gen_range(0..neighbors[pick].len())];
                synthetic_x.extend(Self::generate_sample(
                    x.row(class_idx[pick]),
                    x.row(neighbor),
                    &mut rng,
                ));
                synthetic_y.push(class);
            }

            debug!(class, generated = n_to_generate, k, "SMOTE class oversampled");
            n_synthetic.push(n_to_generate);
        }

        // Build result: original rows + synthetic rows
        let n_original = x.nrows();
        let n_total = n_original + synthetic_y.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[(i - n_original) * n_features + j]
            }
        });

        let mut all_y: Vec<i64> = y.to_vec();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_imbalanced_data() -> (Array2<f64>, Array1<i64>) {
        // 20 majority samples around (0, 0), 5 minority samples around (10, 10)
        let mut data = Vec::new();
        let mut labels = Vec::new();

        for i in 0..20 {
            data.push((i % 5) as f64);
            data.push((i / 5) as f64);
            labels.push(0i64);
        }

        for i in 0..5 {
            data.push(10.0 + (i % 3) as f64);
            data.push(10.0 + (i / 3) as f64);
            labels.push(1i64);
        }

        let x = Array2::from_shape_vec((25, 2), data).unwrap();
        let y = Array1::from_vec(labels);

        (x, y)
    }

    #[test]
    fn test_smote_balances_classes() {
        let (x, y) = create_imbalanced_data();

        let mut smote = SMOTE::new().with_k_neighbors(3).with_seed(42);
        let result = smote.fit_resample(&x, &y).unwrap();

        let counts = class_counts(&result.y);
        assert_eq!(counts[&0], 20);
        assert_eq!(counts[&1], 20);
        assert_eq!(result.n_synthetic, vec![0, 15]);
    }

    #[test]
    fn test_smote_preserves_original() {
        let (x, y) = create_imbalanced_data();
        let original_rows = x.nrows();

        let mut smote = SMOTE::new().with_seed(42);
        let result = smote.fit_resample(&x, &y).unwrap();

        for i in 0..original_rows {
            for j in 0..x.ncols() {
                assert_eq!(result.x[[i, j]], x[[i, j]]);
            }
        }
    }

    #[test]
    fn test_synthetic_points_stay_in_minority_hull() {
        let (x, y) = create_imbalanced_data();
        let mut smote = SMOTE::new().with_seed(7);
        let result = smote.fit_resample(&x, &y).unwrap();

        for i in x.nrows()..result.x.nrows() {
            assert!(result.x[[i, 0]] >= 10.0 && result.x[[i, 0]] <= 12.0);
            assert!(result.x[[i, 1]] >= 10.0 && result.x[[i, 1]] <= 11.0);
        }
    }

    #[test]
    fn test_smote_deterministic() {
        let (x, y) = create_imbalanced_data();
        let a = SMOTE::new().with_seed(1).fit_resample(&x, &y).unwrap();
        let b = SMOTE::new().with_seed(1).fit_resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_singleton_class_and_duplicates() {
        // Duplicate points and a one-sample class must not stall the sampler
        let x = Array2::from_shape_vec(
            (6, 1),
            vec![0.0, 0.0, 0.0, 0.0, 5.0, 5.0],
        )
        .unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 0, 1, 2]);

        let result = SMOTE::new().fit_resample(&x, &y).unwrap();
        let counts = class_counts(&result.y);
        assert_eq!(counts[&1], 1);
        assert_eq!(counts[&2], 1);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((3, 2));
        let y = Array1::from_vec(vec![1, 1, 1]);
        assert!(SMOTE::new().fit_resample(&x, &y).is_err());
    }

    #[test]
    fn test_k_nearest_excludes_self_by_index() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 0.0, 1.0, 3.0]).unwrap();
        let nn = k_nearest(x.row(0), x.rows().into_iter().enumerate(), 0, 2);
        assert_eq!(nn, vec![1, 2]);
    }
}
