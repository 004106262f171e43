//! Random forest on bagged CART trees

use crate::error::{MlError, Result};
use crate::training::linear::check_shapes;
use crate::training::tree::{DecisionTree, SplitCriterion};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bootstrap-aggregated trees with sqrt-feature subsampling per split.
/// Gini trees vote for classification, variance trees average for
/// regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub criterion: SplitCriterion,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub seed: u64,
    trees: Vec<DecisionTree>,
    n_features: usize,
    is_fitted: bool,
}

impl RandomForest {
    pub fn new(criterion: SplitCriterion, n_estimators: usize, max_depth: usize) -> Self {
        Self {
            criterion,
            n_estimators,
            max_depth,
            seed: 42,
            trees: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        let n = x.nrows();
        self.n_features = x.ncols();
        let max_features = (self.n_features as f64).sqrt().ceil() as usize;

        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let tree_seed = self.seed.wrapping_add(t as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);

                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut bx = Array2::zeros((n, self.n_features));
                let mut by = Array1::zeros(n);
                for (row, &i) in sample.iter().enumerate() {
                    bx.row_mut(row).assign(&x.row(i));
                    by[row] = y[i];
                }

                let mut tree = DecisionTree::new(self.criterion, self.max_depth)
                    .with_max_features(max_features)
                    .with_seed(tree_seed);
                tree.fit(&bx, &by)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(MlError::NotFitted);
        }

        let out: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let votes: Vec<f64> = self.trees.iter().map(|t| t.predict_row(&row)).collect();
                match self.criterion {
                    SplitCriterion::Gini => majority(&votes),
                    SplitCriterion::Variance => {
                        votes.iter().sum::<f64>() / votes.len() as f64
                    }
                }
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    /// Mean of per-tree impurity-decrease importances.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut out = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (j, v) in tree.feature_importances().iter().enumerate() {
                out[j] += v;
            }
        }
        for v in out.iter_mut() {
            *v /= self.trees.len() as f64;
        }
        Some(out)
    }
}

fn majority(votes: &[f64]) -> f64 {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for &v in votes {
        *counts.entry(v.to_bits()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(bits, _)| f64::from_bits(bits))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_forest_classifies_separable_data() {
        let x = array![
            [1.0, 1.0], [1.2, 0.8], [0.8, 1.1], [1.1, 1.2],
            [8.0, 8.0], [8.2, 7.8], [7.8, 8.1], [8.1, 8.2],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mut forest = RandomForest::new(SplitCriterion::Gini, 20, 5);
        forest.fit(&x, &y).unwrap();

        let pred = forest.predict(&array![[1.0, 1.0], [8.0, 8.0]]).unwrap();
        assert_eq!(pred[0], 0.0);
        assert_eq!(pred[1], 1.0);
    }

    #[test]
    fn test_forest_regression_tracks_levels() {
        let x = array![
            [0.0], [0.5], [1.0], [1.5],
            [10.0], [10.5], [11.0], [11.5],
        ];
        let y = array![2.0, 2.0, 2.0, 2.0, 30.0, 30.0, 30.0, 30.0];
        let mut forest = RandomForest::new(SplitCriterion::Variance, 20, 4);
        forest.fit(&x, &y).unwrap();

        let pred = forest.predict(&array![[0.7], [10.7]]).unwrap();
        assert!((pred[0] - 2.0).abs() < 5.0);
        assert!(pred[1] > 15.0);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let x = array![[1.0], [2.0], [9.0], [10.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut a = RandomForest::new(SplitCriterion::Gini, 10, 3);
        a.fit(&x, &y).unwrap();
        let mut b = RandomForest::new(SplitCriterion::Gini, 10, 3);
        b.fit(&x, &y).unwrap();

        let pa = a.predict(&x).unwrap();
        let pb = b.predict(&x).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_forest_importances_normalized() {
        let x = array![
            [1.0, 0.0], [2.0, 0.0], [3.0, 0.0],
            [10.0, 0.0], [11.0, 0.0], [12.0, 0.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut forest = RandomForest::new(SplitCriterion::Gini, 10, 3);
        forest.fit(&x, &y).unwrap();

        let imp = forest.feature_importances().unwrap();
        assert!(imp[0] > imp[1]);
    }
}
