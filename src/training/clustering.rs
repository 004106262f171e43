//! Clustering: k-means, DBSCAN, and agglomerative
//!
//! All three are unsupervised and expose `fit_predict` returning integer
//! cluster labels (-1 marks DBSCAN noise).

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn euclidean_sq(a: &ndarray::ArrayView1<f64>, b: &ndarray::ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Lloyd's algorithm with k-means++ seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
    centroids: Option<Array2<f64>>,
    /// Sum of squared distances to the assigned centroid after fit.
    pub inertia: Option<f64>,
    is_fitted: bool,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
            centroids: None,
            inertia: None,
            is_fitted: false,
        }
    }

    pub fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let n = x.nrows();
        if n < self.n_clusters {
            return Err(MlError::Training(format!(
                "{} samples cannot form {} clusters",
                n, self.n_clusters
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut centroids = self.plus_plus_init(x, &mut rng);
        let mut labels = vec![0i64; n];

        for _ in 0..self.max_iter {
            let new_labels: Vec<i64> = (0..n)
                .into_par_iter()
                .map(|i| nearest_centroid(&x.row(i), &centroids) as i64)
                .collect();

            let changed = new_labels
                .iter()
                .zip(labels.iter())
                .filter(|(a, b)| a != b)
                .count();
            labels = new_labels;

            let mut sums = Array2::<f64>::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for i in 0..n {
                let c = labels[i] as usize;
                counts[c] += 1;
                for j in 0..x.ncols() {
                    sums[[c, j]] += x[[i, j]];
                }
            }
            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    for j in 0..x.ncols() {
                        sums[[c, j]] /= counts[c] as f64;
                    }
                } else {
                    // re-seed an empty cluster from a random sample
                    let idx = rng.gen_range(0..n);
                    sums.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(sums.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            centroids = sums;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        let inertia: f64 = (0..n)
            .map(|i| euclidean_sq(&x.row(i), &centroids.row(labels[i] as usize)))
            .sum();
        self.inertia = Some(inertia);
        self.centroids = Some(centroids);
        self.is_fitted = true;
        Ok(Array1::from_vec(labels))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let centroids = self.centroids.as_ref().ok_or(MlError::NotFitted)?;
        let out: Vec<i64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| nearest_centroid(&x.row(i), centroids) as i64)
            .collect();
        Ok(Array1::from_vec(out))
    }

    fn plus_plus_init(&self, x: &Array2<f64>, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n = x.nrows();
        let mut centroids = Array2::zeros((self.n_clusters, x.ncols()));
        centroids.row_mut(0).assign(&x.row(rng.gen_range(0..n)));

        for c in 1..self.n_clusters {
            let dists: Vec<f64> = (0..n)
                .map(|i| {
                    (0..c)
                        .map(|j| euclidean_sq(&x.row(i), &centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();
            let total: f64 = dists.iter().sum();
            let chosen = if total <= 0.0 {
                rng.gen_range(0..n)
            } else {
                let r = rng.gen_range(0.0..total);
                let mut cumulative = 0.0;
                let mut pick = n - 1;
                for (i, &d) in dists.iter().enumerate() {
                    cumulative += d;
                    if cumulative >= r {
                        pick = i;
                        break;
                    }
                }
                pick
            };
            centroids.row_mut(c).assign(&x.row(chosen));
        }
        centroids
    }
}

fn nearest_centroid(row: &ndarray::ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for c in 0..centroids.nrows() {
        let d = euclidean_sq(row, &centroids.row(c));
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    best
}

/// Density-based clustering. Core points have at least `min_samples`
/// neighbors within `eps`; unreachable points get label -1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dbscan {
    pub eps: f64,
    pub min_samples: usize,
    pub n_clusters_found: usize,
    pub n_noise: usize,
    core_points: Option<Array2<f64>>,
    core_labels: Vec<i64>,
    is_fitted: bool,
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self {
            eps,
            min_samples,
            n_clusters_found: 0,
            n_noise: 0,
            core_points: None,
            core_labels: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let n = x.nrows();
        let eps_sq = self.eps * self.eps;

        let neighbors: Vec<Vec<usize>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .filter(|&j| euclidean_sq(&x.row(i), &x.row(j)) <= eps_sq)
                    .collect()
            })
            .collect();
        let is_core: Vec<bool> = neighbors.iter().map(|nb| nb.len() >= self.min_samples).collect();

        let mut labels = vec![-1i64; n];
        let mut cluster = 0i64;

        for i in 0..n {
            if labels[i] != -1 || !is_core[i] {
                continue;
            }
            labels[i] = cluster;
            let mut queue = neighbors[i].clone();
            let mut head = 0;
            while head < queue.len() {
                let q = queue[head];
                head += 1;
                if labels[q] == -1 {
                    labels[q] = cluster;
                    if is_core[q] {
                        queue.extend(neighbors[q].iter().copied());
                    }
                }
            }
            cluster += 1;
        }

        self.n_clusters_found = cluster as usize;
        self.n_noise = labels.iter().filter(|&&l| l == -1).count();

        let core_indices: Vec<usize> = (0..n).filter(|&i| is_core[i]).collect();
        let mut core_points = Array2::zeros((core_indices.len(), x.ncols()));
        for (row, &i) in core_indices.iter().enumerate() {
            core_points.row_mut(row).assign(&x.row(i));
        }
        self.core_labels = core_indices.iter().map(|&i| labels[i]).collect();
        self.core_points = Some(core_points);
        self.is_fitted = true;
        Ok(Array1::from_vec(labels))
    }

    /// Label unseen rows by their nearest core point. Rows farther than
    /// `eps` from every core point are noise (-1).
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let core_points = self.core_points.as_ref().ok_or(MlError::NotFitted)?;
        let eps_sq = self.eps * self.eps;
        let out: Vec<i64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let mut best = -1i64;
                let mut best_dist = f64::MAX;
                for c in 0..core_points.nrows() {
                    let d = euclidean_sq(&x.row(i), &core_points.row(c));
                    if d <= eps_sq && d < best_dist {
                        best_dist = d;
                        best = self.core_labels[c];
                    }
                }
                best
            })
            .collect();
        Ok(Array1::from_vec(out))
    }
}

/// Bottom-up agglomerative clustering with average linkage, cut when
/// `n_clusters` groups remain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agglomerative {
    pub n_clusters: usize,
    is_fitted: bool,
}

impl Agglomerative {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            is_fitted: false,
        }
    }

    pub fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let n = x.nrows();
        if n < self.n_clusters {
            return Err(MlError::Training(format!(
                "{} samples cannot form {} clusters",
                n, self.n_clusters
            )));
        }

        // pairwise distances, then greedy merges by average linkage
        let dist: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| euclidean_sq(&x.row(i), &x.row(j)).sqrt())
                    .collect()
            })
            .collect();

        let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        while clusters.len() > self.n_clusters {
            let mut best = (0usize, 1usize);
            let mut best_dist = f64::MAX;
            for a in 0..clusters.len() {
                for b in (a + 1)..clusters.len() {
                    let mut sum = 0.0;
                    for &i in &clusters[a] {
                        for &j in &clusters[b] {
                            sum += dist[i][j];
                        }
                    }
                    let avg = sum / (clusters[a].len() * clusters[b].len()) as f64;
                    if avg < best_dist {
                        best_dist = avg;
                        best = (a, b);
                    }
                }
            }
            let merged = clusters.remove(best.1);
            clusters[best.0].extend(merged);
        }

        let mut labels = vec![0i64; n];
        for (c, members) in clusters.iter().enumerate() {
            for &i in members {
                labels[i] = c as i64;
            }
        }
        self.is_fitted = true;
        Ok(Array1::from_vec(labels))
    }
}
