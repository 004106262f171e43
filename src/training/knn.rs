//! Brute-force k-nearest-neighbors

use crate::error::{MlError, Result};
use crate::training::linear::check_shapes;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnnTask {
    Classification,
    Regression,
}

/// Stores the training set and answers queries by exact neighbor search,
/// parallel over query rows. Majority vote for classification, neighbor
/// mean for regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    pub task: KnnTask,
    pub n_neighbors: usize,
    train_x: Option<Array2<f64>>,
    train_y: Option<Array1<f64>>,
    is_fitted: bool,
}

impl KNearestNeighbors {
    pub fn new(task: KnnTask, n_neighbors: usize) -> Self {
        Self {
            task,
            n_neighbors,
            train_x: None,
            train_y: None,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        if self.n_neighbors == 0 {
            return Err(MlError::Training("n_neighbors must be at least 1".to_string()));
        }
        self.train_x = Some(x.clone());
        self.train_y = Some(y.clone());
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let train_x = self.train_x.as_ref().ok_or(MlError::NotFitted)?;
        let train_y = self.train_y.as_ref().ok_or(MlError::NotFitted)?;
        let k = self.n_neighbors.min(train_x.nrows());

        let out: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let mut dists: Vec<(f64, f64)> = (0..train_x.nrows())
                    .map(|j| {
                        let d: f64 = row
                            .iter()
                            .zip(train_x.row(j).iter())
                            .map(|(a, b)| (a - b).powi(2))
                            .sum();
                        (d, train_y[j])
                    })
                    .collect();
                dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                let neighbors = &dists[..k];

                match self.task {
                    KnnTask::Regression => {
                        neighbors.iter().map(|(_, y)| y).sum::<f64>() / k as f64
                    }
                    KnnTask::Classification => {
                        let mut counts: HashMap<u64, usize> = HashMap::new();
                        for (_, y) in neighbors {
                            *counts.entry(y.to_bits()).or_insert(0) += 1;
                        }
                        counts
                            .into_iter()
                            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                            .map(|(bits, _)| f64::from_bits(bits))
                            .unwrap_or(0.0)
                    }
                }
            })
            .collect();
        Ok(Array1::from_vec(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_classification() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [0.2, 0.0], [5.0, 5.0], [5.1, 5.1], [5.2, 5.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = KNearestNeighbors::new(KnnTask::Classification, 3);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&array![[0.05, 0.05], [5.05, 5.05]]).unwrap();
        assert_eq!(pred[0], 0.0);
        assert_eq!(pred[1], 1.0);
    }

    #[test]
    fn test_knn_regression_is_neighbor_mean() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![10.0, 20.0, 30.0];
        let mut model = KNearestNeighbors::new(KnnTask::Regression, 2);
        model.fit(&x, &y).unwrap();

        // neighbors of 0.4 are rows 0 and 1
        let pred = model.predict(&array![[0.4]]).unwrap();
        assert_eq!(pred[0], 15.0);
    }

    #[test]
    fn test_knn_k_larger_than_train_is_clamped() {
        let x = array![[0.0], [1.0]];
        let y = array![2.0, 4.0];
        let mut model = KNearestNeighbors::new(KnnTask::Regression, 10);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&array![[0.5]]).unwrap();
        assert_eq!(pred[0], 3.0);
    }

    #[test]
    fn test_knn_zero_k_is_error() {
        let x = array![[0.0]];
        let y = array![1.0];
        let mut model = KNearestNeighbors::new(KnnTask::Classification, 0);
        assert!(model.fit(&x, &y).is_err());
    }
}
