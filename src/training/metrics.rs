//! Evaluation metrics
//!
//! Classification metrics use support-weighted averaging over classes so
//! multi-class problems report a single precision/recall/F1 triple.

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};

/// Fraction of exactly matching labels.
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(a, b)| (**a - **b).abs() < 1e-9)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Support-weighted precision, recall, and F1 over all observed classes.
pub fn weighted_prf(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (f64, f64, f64) {
    let mut classes: Vec<f64> = y_true.to_vec();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let total = y_true.len() as f64;
    if total == 0.0 {
        return (0.0, 0.0, 0.0);
    }

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;

    for &class in &classes {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let is_true = (*t - class).abs() < 1e-9;
            let is_pred = (*p - class).abs() < 1e-9;
            match (is_true, is_pred) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                _ => {}
            }
        }

        let support = (tp + fn_) as f64;
        let p = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let r = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

        let weight = support / total;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    (precision, recall, f1)
}

/// Coefficient of determination. A constant target scores 1.0 when matched
/// exactly, 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            return 1.0;
        }
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

fn euclidean(a: &ndarray::ArrayView1<f64>, b: &ndarray::ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn distinct_labels(labels: &Array1<i64>) -> Vec<i64> {
    let mut out: Vec<i64> = labels.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

/// Mean silhouette coefficient over all samples. Singleton-cluster samples
/// contribute 0. Errors when fewer than 2 clusters are present.
pub fn silhouette_score(x: &Array2<f64>, labels: &Array1<i64>) -> Result<f64> {
    let n = x.nrows();
    let clusters = distinct_labels(labels);
    if clusters.len() < 2 || n < 2 {
        return Err(MlError::Computation(
            "silhouette needs at least 2 clusters".to_string(),
        ));
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        let mut intra_sum = 0.0;
        let mut intra_count = 0usize;
        let mut inter: Vec<(i64, f64, usize)> =
            clusters.iter().filter(|&&c| c != own).map(|&c| (c, 0.0, 0)).collect();

        for j in 0..n {
            if i == j {
                continue;
            }
            let d = euclidean(&x.row(i), &x.row(j));
            if labels[j] == own {
                intra_sum += d;
                intra_count += 1;
            } else if let Some(entry) = inter.iter_mut().find(|(c, _, _)| *c == labels[j]) {
                entry.1 += d;
                entry.2 += 1;
            }
        }

        if intra_count == 0 {
            // singleton cluster
            continue;
        }

        let a = intra_sum / intra_count as f64;
        let b = inter
            .iter()
            .filter(|(_, _, count)| *count > 0)
            .map(|(_, sum, count)| sum / *count as f64)
            .fold(f64::MAX, f64::min);
        if b == f64::MAX {
            continue;
        }

        total += (b - a) / a.max(b);
    }

    Ok(total / n as f64)
}

/// Calinski-Harabasz index: ratio of between-cluster to within-cluster
/// dispersion. Errors when fewer than 2 clusters are present.
pub fn calinski_harabasz_score(x: &Array2<f64>, labels: &Array1<i64>) -> Result<f64> {
    let n = x.nrows();
    let d = x.ncols();
    let clusters = distinct_labels(labels);
    let k = clusters.len();
    if k < 2 || n <= k {
        return Err(MlError::Computation(
            "calinski-harabasz needs at least 2 clusters and more samples than clusters"
                .to_string(),
        ));
    }

    let mut overall = vec![0.0f64; d];
    for i in 0..n {
        for j in 0..d {
            overall[j] += x[[i, j]];
        }
    }
    for v in overall.iter_mut() {
        *v /= n as f64;
    }

    let mut between = 0.0;
    let mut within = 0.0;
    for &c in &clusters {
        let members: Vec<usize> = (0..n).filter(|&i| labels[i] == c).collect();
        if members.is_empty() {
            continue;
        }
        let mut centroid = vec![0.0f64; d];
        for &i in &members {
            for j in 0..d {
                centroid[j] += x[[i, j]];
            }
        }
        for v in centroid.iter_mut() {
            *v /= members.len() as f64;
        }

        between += members.len() as f64
            * centroid
                .iter()
                .zip(overall.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
        for &i in &members {
            within += (0..d).map(|j| (x[[i, j]] - centroid[j]).powi(2)).sum::<f64>();
        }
    }

    if within == 0.0 {
        return Err(MlError::Computation(
            "zero within-cluster dispersion".to_string(),
        ));
    }
    Ok((between / within) * ((n - k) as f64 / (k - 1) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let t = array![0.0, 1.0, 1.0, 0.0];
        let p = array![0.0, 1.0, 0.0, 0.0];
        assert_eq!(accuracy(&t, &p), 0.75);
    }

    #[test]
    fn test_weighted_prf_perfect() {
        let t = array![0.0, 1.0, 2.0, 1.0];
        let (p, r, f) = weighted_prf(&t, &t);
        assert_eq!((p, r, f), (1.0, 1.0, 1.0));
    }

    #[test]
    fn test_weighted_prf_in_unit_interval() {
        let t = array![0.0, 0.0, 1.0, 1.0, 2.0];
        let p = array![0.0, 1.0, 1.0, 2.0, 2.0];
        let (pr, rc, f1) = weighted_prf(&t, &p);
        for v in [pr, rc, f1] {
            assert!((0.0..=1.0).contains(&v), "metric out of range: {v}");
        }
    }

    #[test]
    fn test_r2_perfect_fit() {
        let t = array![1.0, 2.0, 3.0];
        assert_eq!(r2_score(&t, &t), 1.0);
    }

    #[test]
    fn test_r2_mean_predictor_is_zero() {
        let t = array![1.0, 2.0, 3.0];
        let p = array![2.0, 2.0, 2.0];
        assert!(r2_score(&t, &p).abs() < 1e-12);
    }

    #[test]
    fn test_mse_mae() {
        let t = array![0.0, 0.0];
        let p = array![3.0, -3.0];
        assert_eq!(mean_squared_error(&t, &p), 9.0);
        assert_eq!(mean_absolute_error(&t, &p), 3.0);
    }

    #[test]
    fn test_silhouette_separated_clusters() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]];
        let labels = array![0i64, 0, 1, 1];
        let s = silhouette_score(&x, &labels).unwrap();
        assert!(s > 0.9, "tight separated clusters should score high, got {s}");
    }

    #[test]
    fn test_silhouette_single_cluster_errors() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let labels = array![0i64, 0];
        assert!(silhouette_score(&x, &labels).is_err());
    }

    #[test]
    fn test_calinski_harabasz_separated_beats_mixed() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]];
        let good = calinski_harabasz_score(&x, &array![0i64, 0, 1, 1]).unwrap();
        let bad = calinski_harabasz_score(&x, &array![0i64, 1, 0, 1]).unwrap();
        assert!(good > bad);
    }
}
