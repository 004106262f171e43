//! Linear support vector machines trained by SGD
//!
//! Hinge loss with one-vs-rest for classification, epsilon-insensitive loss
//! for regression. Both use a decaying step size over seeded shuffles.

use crate::error::{MlError, Result};
use crate::training::linear::{check_shapes, sorted_classes};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvc {
    pub c: f64,
    pub max_iter: usize,
    pub seed: u64,
    classes: Vec<f64>,
    weights: Option<Array2<f64>>,
    intercepts: Vec<f64>,
    is_fitted: bool,
}

impl LinearSvc {
    pub fn new(c: f64, max_iter: usize) -> Self {
        Self {
            c,
            max_iter,
            seed: 42,
            classes: Vec::new(),
            weights: None,
            intercepts: Vec::new(),
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

        let d = x.ncols();
        let lambda = 1.0 / (self.c.max(1e-12) * x.nrows() as f64);
        let mut weights = Array2::zeros((classes.len(), d));
        let mut intercepts = vec![0.0f64; classes.len()];

        for (ci, &class) in classes.iter().enumerate() {
            let target: Vec<f64> = y
                .iter()
                .map(|&v| if (v - class).abs() < 1e-9 { 1.0 } else { -1.0 })
                .collect();
            let (w, b) = self.fit_binary(x, &target, lambda)?;
            weights.row_mut(ci).assign(&w);
            intercepts[ci] = b;
        }

        self.classes = classes;
        self.weights = Some(weights);
        self.intercepts = intercepts;
        self.is_fitted = true;
        Ok(self)
    }

    /// Pegasos-style SGD on the regularized hinge objective.
    fn fit_binary(&self, x: &Array2<f64>, y: &[f64], lambda: f64) -> Result<(Array1<f64>, f64)> {
        let n = x.nrows();
        let d = x.ncols();
        let mut w = Array1::<f64>::zeros(d);
        let mut b = 0.0f64;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n).collect();
        let mut t = 1usize;

        for _epoch in 0..self.max_iter {
            order.shuffle(&mut rng);
            for &i in &order {
                let eta = 1.0 / (lambda * t as f64);
                let row = x.row(i);
                let margin = y[i] * (row.dot(&w) + b);

                w *= 1.0 - eta * lambda;
                if margin < 1.0 {
                    for (wj, xj) in w.iter_mut().zip(row.iter()) {
                        *wj += eta * y[i] * xj;
                    }
                    b += eta * y[i];
                }
                t += 1;
            }
        }
        Ok((w, b))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or(MlError::NotFitted)?;

        let out: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = x.row(i);
                let mut best = 0usize;
                let mut best_score = f64::NEG_INFINITY;
                for (ci, w) in weights.axis_iter(Axis(0)).enumerate() {
                    let score = row.dot(&w) + self.intercepts[ci];
                    if score > best_score {
                        best_score = score;
                        best = ci;
                    }
                }
                self.classes[best]
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    pub fn mean_abs_coefficients(&self) -> Option<Vec<f64>> {
        let weights = self.weights.as_ref()?;
        let k = weights.nrows() as f64;
        Some(
            (0..weights.ncols())
                .map(|j| weights.column(j).iter().map(|v| v.abs()).sum::<f64>() / k)
                .collect(),
        )
    }
}

/// Epsilon-insensitive linear regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvr {
    pub c: f64,
    pub epsilon: f64,
    pub max_iter: usize,
    pub seed: u64,
    weights: Option<Array1<f64>>,
    intercept: f64,
    is_fitted: bool,
}

impl LinearSvr {
    pub fn new(c: f64, max_iter: usize) -> Self {
        Self {
            c,
            epsilon: 0.1,
            max_iter,
            seed: 42,
            weights: None,
            intercept: 0.0,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        let n = x.nrows();
        let d = x.ncols();
        let lambda = 1.0 / (self.c.max(1e-12) * n as f64);

        let mut w = Array1::<f64>::zeros(d);
        let mut b = y.mean().unwrap_or(0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n).collect();
        let mut t = 1usize;

        for _epoch in 0..self.max_iter {
            order.shuffle(&mut rng);
            for &i in &order {
                let eta = 1.0 / (lambda * t as f64);
                let row = x.row(i);
                let err = row.dot(&w) + b - y[i];

                w *= 1.0 - eta * lambda;
                if err > self.epsilon {
                    for (wj, xj) in w.iter_mut().zip(row.iter()) {
                        *wj -= eta * xj;
                    }
                    b -= eta;
                } else if err < -self.epsilon {
                    for (wj, xj) in w.iter_mut().zip(row.iter()) {
                        *wj += eta * xj;
                    }
                    b += eta;
                }
                t += 1;
            }
        }

        self.weights = Some(w);
        self.intercept = b;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights.as_ref().ok_or(MlError::NotFitted)?;
        Ok(x.dot(w) + self.intercept)
    }

    pub fn abs_coefficients(&self) -> Option<Vec<f64>> {
        self.weights.as_ref().map(|w| w.iter().map(|v| v.abs()).collect())
    }
}
