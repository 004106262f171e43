//! K-fold cross-validation

use crate::dataset::{take_rows, take_values, RANDOM_SEED};
use crate::error::{MlError, Result};
use crate::training::metrics::{accuracy, r2_score};
use crate::training::registry::{build_supervised, ModelKind, ModelParams, TaskType};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Shuffled fold assignments: k (train, holdout) index pairs.
pub fn k_fold_indices(n: usize, k: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n / k;
    let remainder = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;

    for fold in 0..k {
        let size = base + usize::from(fold < remainder);
        let holdout: Vec<usize> = indices[start..start + size].to_vec();
        let train: Vec<usize> = indices[..start]
            .iter()
            .chain(indices[start + size..].iter())
            .copied()
            .collect();
        folds.push((train, holdout));
        start += size;
    }
    folds
}

/// Per-fold scores for a supervised model: accuracy for classification,
/// R-squared for regression. A fresh estimator is built for every fold.
pub fn cross_validate(
    task: TaskType,
    model: ModelKind,
    params: &ModelParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    k: usize,
) -> Result<Vec<f64>> {
    let n = x.nrows();
    if n < k {
        return Err(MlError::Training(format!(
            "{n} samples are too few for {k}-fold validation"
        )));
    }

    let mut scores = Vec::with_capacity(k);
    for (train_idx, test_idx) in k_fold_indices(n, k, RANDOM_SEED) {
        let x_train = take_rows(x, &train_idx);
        let y_train = take_values(y, &train_idx);
        let x_test = take_rows(x, &test_idx);
        let y_test = take_values(y, &test_idx);

        let mut estimator = build_supervised(task, model, params)?;
        estimator.fit(&x_train, &y_train)?;
        let pred = estimator.predict(&x_test)?;

        let score = match task {
            TaskType::Classification => accuracy(&y_test, &pred),
            TaskType::Regression => r2_score(&y_test, &pred),
            _ => {
                return Err(MlError::Config(
                    "cross-validation applies to supervised tasks only".to_string(),
                ))
            }
        };
        scores.push(score);
    }
    Ok(scores)
}

pub fn mean_std(scores: &[f64]) -> (f64, f64) {
    if scores.is_empty() {
        return (0.0, 0.0);
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_folds_partition_all_rows() {
        let folds = k_fold_indices(23, 5, RANDOM_SEED);
        assert_eq!(folds.len(), 5);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, h)| h.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        for (train, holdout) in &folds {
            assert_eq!(train.len() + holdout.len(), 23);
            for i in holdout {
                assert!(!train.contains(i));
            }
        }
    }

    #[test]
    fn test_cross_validate_returns_k_scores() {
        let n = 40;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(n, |i| if i < n / 2 { 0.0 } else { 1.0 });

        let scores = cross_validate(
            TaskType::Classification,
            ModelKind::Knn,
            &ModelParams::default(),
            &x,
            &y,
            5,
        )
        .unwrap();
        assert_eq!(scores.len(), 5);
        for s in &scores {
            assert!((0.0..=1.0).contains(s));
        }
    }

    #[test]
    fn test_cross_validate_rejects_clustering() {
        let x = Array2::zeros((10, 2));
        let y = Array1::zeros(10);
        let err = cross_validate(
            TaskType::Clustering,
            ModelKind::Kmeans,
            &ModelParams::default(),
            &x,
            &y,
            5,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[1.0, 1.0, 1.0]);
        assert_eq!(mean, 1.0);
        assert_eq!(std, 0.0);
    }
}
