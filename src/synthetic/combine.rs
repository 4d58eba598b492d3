//! SMOTE oversampling followed by ENN cleaning

use crate::error::Result;
use crate::synthetic::{class_counts, imbalance_ratio, EditedNearestNeighbours, ResampleResult, Sampler, SMOTE};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SMOTEENN {
    smote: SMOTE,
    enn: EditedNearestNeighbours,
}

impl SMOTEENN {
    pub fn new(smote: SMOTE, enn: EditedNearestNeighbours) -> Self {
        Self { smote, enn }
    }
}

impl Sampler for SMOTEENN {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        self.smote.fit(x, y)
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let oversampled = self.smote.resample(x, y)?;

        let mut enn = self.enn.clone();
        let cleaned = enn.fit_resample(&oversampled.x, &oversampled.y)?;

        info!(
            before = ?class_counts(y),
            after = ?class_counts(&cleaned.y),
            ratio_before = imbalance_ratio(y),
            ratio_after = imbalance_ratio(&cleaned.y),
            "SMOTEENN balancing"
        );

        Ok(ResampleResult {
            x: cleaned.x,
            y: cleaned.y,
            n_synthetic: oversampled.n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn blobs() -> (Array2<f64>, Array1<i64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sizes = [(0i64, 120usize, 0.0), (1, 25, 6.0), (2, 8, 12.0)];
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for (class, n, center) in sizes {
            for _ in 0..n {
                data.push(center + rng.gen_range(-1.0..1.0));
                data.push(center + rng.gen_range(-1.0..1.0));
                labels.push(class);
            }
        }
        let n = labels.len();
        (Array2::from_shape_vec((n, 2), data).unwrap(), Array1::from_vec(labels))
    }

    #[test]
    fn test_smoteenn_reduces_imbalance() {
        let (x, y) = blobs();
        let before = imbalance_ratio(&y);

        let mut sampler = SMOTEENN::default();
        let result = sampler.fit_resample(&x, &y).unwrap();

        assert!(imbalance_ratio(&result.y) < before);
        assert_eq!(class_counts(&result.y).len(), 3);
        assert_eq!(result.x.nrows(), result.y.len());
    }
}
