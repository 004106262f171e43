//! CART decision trees
//!
//! One tree implementation serves both tasks: gini impurity with
//! majority-vote leaves for classification, variance with mean leaves for
//! regression. Splits are midpoints between distinct sorted feature values.

use crate::error::{MlError, Result};
use crate::training::linear::check_shapes;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    Gini,
    Variance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART tree grown depth-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub criterion: SplitCriterion,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features considered per split; None means all.
    pub max_features: Option<usize>,
    pub seed: u64,
    nodes: Vec<Node>,
    n_features: usize,
    importances: Vec<f64>,
    is_fitted: bool,
}

impl DecisionTree {
    pub fn new(criterion: SplitCriterion, max_depth: usize) -> Self {
        Self {
            criterion,
            max_depth,
            min_samples_split: 2,
            max_features: None,
            seed: 42,
            nodes: Vec::new(),
            n_features: 0,
            importances: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        self.n_features = x.ncols();
        self.nodes.clear();
        self.importances = vec![0.0; self.n_features];

        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.grow(x, y, indices, 0, &mut rng);

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            for v in self.importances.iter_mut() {
                *v /= total;
            }
        }
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(MlError::NotFitted);
        }
        let out: Vec<f64> = (0..x.nrows()).map(|i| self.predict_row(&x.row(i))).collect();
        Ok(Array1::from_vec(out))
    }

    pub fn predict_row(&self, row: &ndarray::ArrayView1<f64>) -> f64 {
        let mut node = 0usize;
        loop {
            match &self.nodes[node] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Normalized impurity-decrease importances.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    fn grow(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let n = indices.len();
        let parent_impurity = self.impurity(y, &indices);

        let stop = depth >= self.max_depth
            || n < self.min_samples_split
            || parent_impurity <= 1e-12;
        if !stop {
            if let Some((feature, threshold, decrease)) =
                self.best_split(x, y, &indices, parent_impurity, rng)
            {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[[i, feature]] <= threshold);
                if !left_idx.is_empty() && !right_idx.is_empty() {
                    self.importances[feature] += n as f64 * decrease;

                    let id = self.nodes.len();
                    self.nodes.push(Node::Leaf { value: 0.0 }); // placeholder
                    let left = self.grow(x, y, left_idx, depth + 1, rng);
                    let right = self.grow(x, y, right_idx, depth + 1, rng);
                    self.nodes[id] = Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };
                    return id;
                }
            }
        }

        let value = self.leaf_value(y, &indices);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value });
        id
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if let Some(k) = self.max_features {
            if k < self.n_features {
                features.shuffle(rng);
                features.truncate(k);
            }
        }
        features
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in self.candidate_features(rng) {
            let mut sorted: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (x[[i, feature]], y[i]))
                .collect();
            sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut sweep = ImpuritySweep::new(self.criterion, &sorted);
            for split_at in 1..sorted.len() {
                sweep.move_left(sorted[split_at - 1].1);
                if sorted[split_at].0 <= sorted[split_at - 1].0 {
                    continue;
                }

                let nl = split_at as f64;
                let nr = n - nl;
                let child = (nl / n) * sweep.left_impurity() + (nr / n) * sweep.right_impurity();
                let decrease = parent_impurity - child;
                if decrease > 1e-12 && best.map(|(_, _, d)| decrease > d).unwrap_or(true) {
                    let threshold = (sorted[split_at - 1].0 + sorted[split_at].0) / 2.0;
                    best = Some((feature, threshold, decrease));
                }
            }
        }
        best
    }

    fn impurity(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        match self.criterion {
            SplitCriterion::Gini => {
                let mut counts: HashMap<u64, usize> = HashMap::new();
                for &i in indices {
                    *counts.entry(y[i].to_bits()).or_insert(0) += 1;
                }
                let n = indices.len() as f64;
                1.0 - counts
                    .values()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            SplitCriterion::Variance => {
                let n = indices.len() as f64;
                let mean: f64 = indices.iter().map(|&i| y[i]).sum::<f64>() / n;
                indices.iter().map(|&i| (y[i] - mean).powi(2)).sum::<f64>() / n
            }
        }
    }

    fn leaf_value(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        match self.criterion {
            SplitCriterion::Gini => {
                let mut counts: HashMap<u64, usize> = HashMap::new();
                for &i in indices {
                    *counts.entry(y[i].to_bits()).or_insert(0) += 1;
                }
                counts
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                    .map(|(bits, _)| f64::from_bits(bits))
                    .unwrap_or(0.0)
            }
            SplitCriterion::Variance => {
                let n = indices.len() as f64;
                indices.iter().map(|&i| y[i]).sum::<f64>() / n
            }
        }
    }
}

/// Incremental impurity of the two sides of a sweep over sorted samples.
struct ImpuritySweep {
    criterion: SplitCriterion,
    left_counts: HashMap<u64, usize>,
    right_counts: HashMap<u64, usize>,
    left_n: usize,
    right_n: usize,
    left_sum: f64,
    left_sum_sq: f64,
    right_sum: f64,
    right_sum_sq: f64,
}

impl ImpuritySweep {
    fn new(criterion: SplitCriterion, sorted: &[(f64, f64)]) -> Self {
        let mut right_counts = HashMap::new();
        let mut right_sum = 0.0;
        let mut right_sum_sq = 0.0;
        for &(_, yv) in sorted {
            *right_counts.entry(yv.to_bits()).or_insert(0) += 1;
            right_sum += yv;
            right_sum_sq += yv * yv;
        }
        Self {
            criterion,
            left_counts: HashMap::new(),
            right_counts,
            left_n: 0,
            right_n: sorted.len(),
            left_sum: 0.0,
            left_sum_sq: 0.0,
            right_sum,
            right_sum_sq,
        }
    }

    fn move_left(&mut self, yv: f64) {
        let bits = yv.to_bits();
        *self.left_counts.entry(bits).or_insert(0) += 1;
        if let Some(c) = self.right_counts.get_mut(&bits) {
            *c -= 1;
        }
        self.left_n += 1;
        self.right_n -= 1;
        self.left_sum += yv;
        self.left_sum_sq += yv * yv;
        self.right_sum -= yv;
        self.right_sum_sq -= yv * yv;
    }

    fn left_impurity(&self) -> f64 {
        Self::side_impurity(
            self.criterion,
            &self.left_counts,
            self.left_n,
            self.left_sum,
            self.left_sum_sq,
        )
    }

    fn right_impurity(&self) -> f64 {
        Self::side_impurity(
            self.criterion,
            &self.right_counts,
            self.right_n,
            self.right_sum,
            self.right_sum_sq,
        )
    }

    fn side_impurity(
        criterion: SplitCriterion,
        counts: &HashMap<u64, usize>,
        n: usize,
        sum: f64,
        sum_sq: f64,
    ) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let nf = n as f64;
        match criterion {
            SplitCriterion::Gini => {
                1.0 - counts
                    .values()
                    .filter(|&&c| c > 0)
                    .map(|&c| (c as f64 / nf).powi(2))
                    .sum::<f64>()
            }
            SplitCriterion::Variance => (sum_sq / nf - (sum / nf).powi(2)).max(0.0),
        }
    }
}
