//! Dimensionality reduction: PCA and t-SNE

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Principal component analysis via power iteration with deflation on the
/// covariance matrix. Data is centered, not rescaled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    pub n_components: usize,
    pub seed: u64,
    mean: Option<Array1<f64>>,
    /// component rows, unit length
    components: Option<Array2<f64>>,
    pub explained_variance_ratio: Vec<f64>,
    is_fitted: bool,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            seed: 42,
            mean: None,
            components: None,
            explained_variance_ratio: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        let d = x.ncols();
        if n < 2 {
            return Err(MlError::Training(
                "dimensionality reduction needs at least 2 samples".to_string(),
            ));
        }
        let k = self.n_components.min(d).min(n);
        if k == 0 {
            return Err(MlError::Training("no components requested".to_string()));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MlError::Computation("empty matrix".to_string()))?;
        let centered = x - &mean.clone().insert_axis(Axis(0));
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        let total_variance: f64 = cov.diag().sum().max(1e-12);

        let (eigenvalues, components) = top_eigenpairs(&cov, k, self.seed);
        self.explained_variance_ratio = eigenvalues
            .iter()
            .map(|&ev| (ev / total_variance).clamp(0.0, 1.0))
            .collect();

        let projected = centered.dot(&components.t());
        self.mean = Some(mean);
        self.components = Some(components);
        self.is_fitted = true;
        Ok(projected)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mean = self.mean.as_ref().ok_or(MlError::NotFitted)?;
        let components = self.components.as_ref().ok_or(MlError::NotFitted)?;
        let centered = x - &mean.clone().insert_axis(Axis(0));
        Ok(centered.dot(&components.t()))
    }
}

/// Top-k eigenpairs of a symmetric matrix by power iteration and deflation.
fn top_eigenpairs(matrix: &Array2<f64>, k: usize, seed: u64) -> (Vec<f64>, Array2<f64>) {
    let d = matrix.nrows();
    let max_iter = 300;
    let tol = 1e-10;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut work = matrix.clone();
    let mut eigenvalues = Vec::with_capacity(k);
    let mut components = Array2::zeros((k, d));

    for c in 0..k {
        let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let norm = v.dot(&v).sqrt().max(1e-12);
        v /= norm;

        let mut eigenvalue = 0.0;
        for _ in 0..max_iter {
            let w = work.dot(&v);
            let new_eigenvalue = v.dot(&w);
            let w_norm = w.dot(&w).sqrt().max(1e-12);
            let new_v = w / w_norm;

            let diff = (&new_v - &v).mapv(|x| x * x).sum().sqrt();
            v = new_v;
            eigenvalue = new_eigenvalue;
            if diff < tol {
                break;
            }
        }

        let eigenvalue = eigenvalue.max(0.0);
        eigenvalues.push(eigenvalue);
        components.row_mut(c).assign(&v);

        for i in 0..d {
            for j in 0..d {
                work[[i, j]] -= eigenvalue * v[i] * v[j];
            }
        }
    }

    (eigenvalues, components)
}

/// t-SNE with perplexity-calibrated Gaussian affinities and a momentum
/// gradient-descent layout. Exact (quadratic) neighbor computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tsne {
    pub n_components: usize,
    pub perplexity: f64,
    pub learning_rate: f64,
    pub n_iter: usize,
    pub seed: u64,
}

impl Tsne {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            perplexity: 30.0,
            learning_rate: 200.0,
            n_iter: 500,
            seed: 42,
        }
    }

    pub fn fit_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n < 3 {
            return Err(MlError::Training(
                "t-sne needs at least 3 samples".to_string(),
            ));
        }
        let k = self.n_components.max(1);
        let perplexity = self.perplexity.min((n as f64 - 1.0) / 3.0).max(1.0);

        let p = self.joint_affinities(x, perplexity);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut y: Array2<f64> = Array2::from_shape_fn((n, k), |_| rng.gen_range(-1e-4..1e-4));
        let mut velocity = Array2::<f64>::zeros((n, k));

        for iter in 0..self.n_iter {
            // early exaggeration sharpens cluster structure at the start
            let exaggeration = if iter < 100 { 4.0 } else { 1.0 };
            let momentum = if iter < 250 { 0.5 } else { 0.8 };

            // student-t low-dimensional affinities
            let mut q_num = Array2::<f64>::zeros((n, n));
            let mut q_sum = 0.0;
            for i in 0..n {
                for j in (i + 1)..n {
                    let d: f64 = (0..k).map(|c| (y[[i, c]] - y[[j, c]]).powi(2)).sum();
                    let q = 1.0 / (1.0 + d);
                    q_num[[i, j]] = q;
                    q_num[[j, i]] = q;
                    q_sum += 2.0 * q;
                }
            }
            let q_sum = q_sum.max(1e-12);

            let mut grad = Array2::<f64>::zeros((n, k));
            for i in 0..n {
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let q = q_num[[i, j]];
                    let coeff = (exaggeration * p[[i, j]] - q / q_sum) * q;
                    for c in 0..k {
                        grad[[i, c]] += 4.0 * coeff * (y[[i, c]] - y[[j, c]]);
                    }
                }
            }

            velocity = momentum * &velocity - self.learning_rate * &grad;
            y = y + &velocity;
        }

        Ok(y)
    }

    /// Symmetrized conditional affinities with per-point bandwidths found by
    /// binary search to match the target perplexity.
    fn joint_affinities(&self, x: &Array2<f64>, perplexity: f64) -> Array2<f64> {
        let n = x.nrows();
        let target_entropy = perplexity.ln();

        let dist_sq: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| {
                        x.row(i)
                            .iter()
                            .zip(x.row(j).iter())
                            .map(|(a, b)| (a - b).powi(2))
                            .sum()
                    })
                    .collect()
            })
            .collect();

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut beta = 1.0;
                let mut beta_min = f64::NEG_INFINITY;
                let mut beta_max = f64::INFINITY;
                let mut probs = vec![0.0; n];

                for _ in 0..50 {
                    let mut sum = 0.0;
                    for j in 0..n {
                        probs[j] = if i == j {
                            0.0
                        } else {
                            (-beta * dist_sq[i][j]).exp()
                        };
                        sum += probs[j];
                    }
                    let sum = sum.max(1e-12);

                    let mut entropy = 0.0;
                    for p in probs.iter_mut() {
                        *p /= sum;
                        if *p > 1e-12 {
                            entropy -= *p * p.ln();
                        }
                    }

                    let diff = entropy - target_entropy;
                    if diff.abs() < 1e-5 {
                        break;
                    }
                    if diff > 0.0 {
                        beta_min = beta;
                        beta = if beta_max.is_finite() {
                            (beta + beta_max) / 2.0
                        } else {
                            beta * 2.0
                        };
                    } else {
                        beta_max = beta;
                        beta = if beta_min.is_finite() {
                            (beta + beta_min) / 2.0
                        } else {
                            beta / 2.0
                        };
                    }
                }
                probs
            })
            .collect();

        let mut p = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                p[[i, j]] = (rows[i][j] + rows[j][i]) / (2.0 * n as f64);
            }
        }
        p.mapv_inplace(|v| v.max(1e-12));
        for i in 0..n {
            p[[i, i]] = 0.0;
        }
        p
    }
}
