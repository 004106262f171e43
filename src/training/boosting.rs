//! Gradient boosting over shallow variance trees
//!
//! The regressor boosts on squared-loss residuals from a constant start.
//! The classifier boosts one logistic ensemble per class (one-vs-rest) on
//! probability residuals and predicts the argmax class.

use crate::error::{MlError, Result};
use crate::training::linear::{check_shapes, sorted_classes};
use crate::training::tree::{DecisionTree, SplitCriterion};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    base_prediction: f64,
    trees: Vec<DecisionTree>,
    n_features: usize,
    is_fitted: bool,
}

impl GradientBoostingRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth,
            base_prediction: 0.0,
            trees: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        self.n_features = x.ncols();
        self.base_prediction = y.mean().unwrap_or(0.0);
        self.trees.clear();

        let mut current: Array1<f64> = Array1::from_elem(y.len(), self.base_prediction);
        for t in 0..self.n_estimators {
            let residuals = y - &current;
            let mut tree = DecisionTree::new(SplitCriterion::Variance, self.max_depth)
                .with_seed(42u64.wrapping_add(t as u64));
            tree.fit(x, &residuals)?;
            let update = tree.predict(x)?;
            current = current + self.learning_rate * &update;
            self.trees.push(tree);
        }

        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(MlError::NotFitted);
        }
        let mut out = Array1::from_elem(x.nrows(), self.base_prediction);
        for tree in &self.trees {
            out = out + self.learning_rate * &tree.predict(x)?;
        }
        Ok(out)
    }

    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        mean_tree_importances(&self.trees, self.n_features)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    classes: Vec<f64>,
    /// per class: log-odds start and the residual trees
    ensembles: Vec<(f64, Vec<DecisionTree>)>,
    n_features: usize,
    is_fitted: bool,
}

impl GradientBoostingClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth,
            classes: Vec::new(),
            ensembles: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        let classes = sorted_classes(y);
        if classes.len() < 2 {
            return Err(MlError::Training(
                "classification needs at least 2 classes".to_string(),
            ));
        }
        self.n_features = x.ncols();
        self.ensembles.clear();

        for &class in &classes {
            let target: Array1<f64> = y
                .iter()
                .map(|&v| if (v - class).abs() < 1e-9 { 1.0 } else { 0.0 })
                .collect();

            let pos = target.sum() / target.len() as f64;
            let pos = pos.clamp(1e-6, 1.0 - 1e-6);
            let base = (pos / (1.0 - pos)).ln();

            let mut score = Array1::from_elem(target.len(), base);
            let mut trees = Vec::with_capacity(self.n_estimators);
            for t in 0..self.n_estimators {
                let prob = score.mapv(|v| 1.0 / (1.0 + (-v).exp()));
                let residuals = &target - &prob;
                let mut tree = DecisionTree::new(SplitCriterion::Variance, self.max_depth)
                    .with_seed(42u64.wrapping_add(t as u64));
                tree.fit(x, &residuals)?;
                score = score + self.learning_rate * &tree.predict(x)?;
                trees.push(tree);
            }
            self.ensembles.push((base, trees));
        }

        self.classes = classes;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(MlError::NotFitted);
        }

        let mut scores: Vec<Array1<f64>> = Vec::with_capacity(self.ensembles.len());
        for (base, trees) in &self.ensembles {
            let mut score = Array1::from_elem(x.nrows(), *base);
            for tree in trees {
                score = score + self.learning_rate * &tree.predict(x)?;
            }
            scores.push(score);
        }

        let out: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let mut best = 0usize;
                let mut best_score = f64::NEG_INFINITY;
                for (ci, score) in scores.iter().enumerate() {
                    if score[i] > best_score {
                        best_score = score[i];
                        best = ci;
                    }
                }
                self.classes[best]
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        let all: Vec<&DecisionTree> = self
            .ensembles
            .iter()
            .flat_map(|(_, trees)| trees.iter())
            .collect();
        if all.is_empty() {
            return None;
        }
        let mut out = vec![0.0; self.n_features];
        for tree in &all {
            for (j, v) in tree.feature_importances().iter().enumerate() {
                out[j] += v;
            }
        }
        for v in out.iter_mut() {
            *v /= all.len() as f64;
        }
        Some(out)
    }
}

fn mean_tree_importances(trees: &[DecisionTree], n_features: usize) -> Option<Vec<f64>> {
    if trees.is_empty() {
        return None;
    }
    let mut out = vec![0.0; n_features];
    for tree in trees {
        for (j, v) in tree.feature_importances().iter().enumerate() {
            out[j] += v;
        }
    }
    for v in out.iter_mut() {
        *v /= trees.len() as f64;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_beats_constant_baseline() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut model = GradientBoostingRegressor::new(50, 0.1, 3);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let mse: f64 = y
            .iter()
            .zip(pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        // constant-mean baseline has mse ~2.9 on this target
        assert!(mse < 0.5, "boosting should fit the trend, mse={mse}");
    }

    #[test]
    fn test_classifier_binary() {
        let x = array![[0.0], [0.5], [1.0], [9.0], [9.5], [10.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = GradientBoostingClassifier::new(20, 0.2, 2);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&array![[0.3], [9.7]]).unwrap();
        assert_eq!(pred[0], 0.0);
        assert_eq!(pred[1], 1.0);
    }

    #[test]
    fn test_classifier_three_classes() {
        let x = array![
            [0.0], [0.2], [0.4],
            [5.0], [5.2], [5.4],
            [10.0], [10.2], [10.4],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let mut model = GradientBoostingClassifier::new(30, 0.2, 2);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        assert_eq!(pred, y);
    }

    #[test]
    fn test_importances_present_after_fit() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [9.0, 0.0], [10.0, 0.0]];
        let y = array![1.0, 1.0, 10.0, 10.0];
        let mut model = GradientBoostingRegressor::new(10, 0.1, 2);
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert!(imp[0] > imp[1]);
    }
}
