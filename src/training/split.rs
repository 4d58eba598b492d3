//! Seeded train/test partitioning

use crate::error::{Result, ThyroidError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Rows of one side of a split
#[derive(Debug, Clone)]
pub struct SplitPart {
    pub x: Array2<f64>,
    pub y: Array1<i64>,
    /// Positions of these rows in the input
    pub indices: Vec<usize>,
}

/// Shuffle rows with a seeded generator and cut off `test_size` of them.
///
/// The test side gets `ceil(n * test_size)` rows. Both sides must end up
/// non-empty.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<i64>,
    test_size: f64,
    seed: u64,
) -> Result<(SplitPart, SplitPart)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ThyroidError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }
    if x.nrows() != y.len() {
        return Err(ThyroidError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }

    let n = x.nrows();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n < 2 || n_test >= n {
        return Err(ThyroidError::EmptyInput(format!(
            "cannot split {n} rows with test_size {test_size}"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let (test_idx, train_idx) = order.split_at(n_test);
    let part = |idx: &[usize]| SplitPart {
        x: x.select(Axis(0), idx),
        y: y.select(Axis(0), idx),
        indices: idx.to_vec(),
    };

    Ok((part(train_idx), part(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> (Array2<f64>, Array1<i64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        let y = Array1::from_shape_fn(n, |i| (i % 3) as i64);
        (x, y)
    }

    #[test]
    fn test_sizes_and_disjoint() {
        let (x, y) = data(10);
        let (train, test) = train_test_split(&x, &y, 0.2, 42).unwrap();
        assert_eq!(train.y.len(), 8);
        assert_eq!(test.y.len(), 2);

        let mut all: Vec<usize> = train.indices.iter().chain(&test.indices).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        // Rows travel with their labels
        for (row, &i) in test.x.rows().into_iter().zip(&test.indices) {
            assert_eq!(row[0], (i * 2) as f64);
        }
    }

    #[test]
    fn test_seed_reproducible() {
        let (x, y) = data(20);
        let (a, _) = train_test_split(&x, &y, 0.25, 7).unwrap();
        let (b, _) = train_test_split(&x, &y, 0.25, 7).unwrap();
        let (c, _) = train_test_split(&x, &y, 0.25, 8).unwrap();
        assert_eq!(a.indices, b.indices);
        assert_ne!(a.indices, c.indices);
    }

    #[test]
    fn test_invalid_fraction() {
        let (x, y) = data(10);
        assert!(train_test_split(&x, &y, 0.0, 1).is_err());
        assert!(train_test_split(&x, &y, 1.0, 1).is_err());
        assert!(train_test_split(&x.slice(ndarray::s![..1, ..]).to_owned(), &y.slice(ndarray::s![..1]).to_owned(), 0.5, 1).is_err());
    }
}
