//! Linear model family: OLS/ridge, lasso, and logistic regression

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the SPD system Ax = b by Cholesky decomposition. Returns None when
/// the matrix is not positive definite even after a small diagonal nudge.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut work = a.clone();
    for attempt in 0..2 {
        if attempt == 1 {
            let nudge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
            work = a.clone();
            for k in 0..n {
                work[[k, k]] += nudge.max(1e-12);
            }
        }
        if let Some(x) = try_cholesky(&work, b) {
            return Some(x);
        }
    }
    None
}

fn try_cholesky(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    let mut y = Array1::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    Some(x)
}

/// Gauss-Jordan solve as a fallback for systems Cholesky rejects.
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let mut pivot = col;
        for row in (col + 1)..n {
            if aug[[row, col]].abs() > aug[[pivot, col]].abs() {
                pivot = row;
            }
        }
        if aug[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for j in 0..=n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[pivot, j]];
                aug[[pivot, j]] = tmp;
            }
        }
        let p = aug[[col, col]];
        for j in 0..=n {
            aug[[col, j]] /= p;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..=n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some((0..n).map(|i| aug[[i, n]]).collect())
}

fn solve_normal_equations(xtx: &Array2<f64>, xty: &Array1<f64>) -> Result<Array1<f64>> {
    cholesky_solve(xtx, xty)
        .or_else(|| gauss_jordan_solve(xtx, xty))
        .ok_or_else(|| MlError::Computation("singular normal equations".to_string()))
}

/// Least-squares regression with optional L2 penalty (ridge when alpha > 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    is_fitted: bool,
}

impl LinearRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            coefficients: None,
            intercept: 0.0,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MlError::Training("empty training set".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean.clone().insert_axis(Axis(0));
        let yc = y - y_mean;

        let mut xtx = xc.t().dot(&xc);
        if self.alpha > 0.0 {
            for i in 0..xtx.nrows() {
                xtx[[i, i]] += self.alpha;
            }
        }
        let xty = xc.t().dot(&yc);

        let coef = solve_normal_equations(&xtx, &xty)?;
        self.intercept = y_mean - coef.dot(&x_mean);
        self.coefficients = Some(coef);
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self.coefficients.as_ref().ok_or(MlError::NotFitted)?;
        Ok(x.dot(coef) + self.intercept)
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }
}

/// L1-penalized regression fit by cyclic coordinate descent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lasso {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    is_fitted: bool,
}

impl Lasso {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-6,
            coefficients: None,
            intercept: 0.0,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        let n = x.nrows();
        let d = x.ncols();

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MlError::Training("empty training set".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean.clone().insert_axis(Axis(0));
        let yc = y - y_mean;

        // squared column norms, constant columns contribute nothing
        let col_sq: Vec<f64> = (0..d)
            .map(|j| xc.column(j).iter().map(|v| v * v).sum())
            .collect();

        let mut w = Array1::<f64>::zeros(d);
        let mut residual = yc.clone();
        let threshold = self.alpha * n as f64;

        for _ in 0..self.max_iter {
            let mut max_delta: f64 = 0.0;
            for j in 0..d {
                if col_sq[j] <= f64::EPSILON {
                    continue;
                }
                let col = xc.column(j);
                let rho: f64 = col
                    .iter()
                    .zip(residual.iter())
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
                    + w[j] * col_sq[j];

                let new_w = soft_threshold(rho, threshold) / col_sq[j];
                let delta = new_w - w[j];
                if delta != 0.0 {
                    for (r, xv) in residual.iter_mut().zip(col.iter()) {
                        *r -= delta * xv;
                    }
                    w[j] = new_w;
                }
                max_delta = max_delta.max(delta.abs());
            }
            if max_delta < self.tol {
                break;
            }
        }

        self.intercept = y_mean - w.dot(&x_mean);
        self.coefficients = Some(w);
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self.coefficients.as_ref().ok_or(MlError::NotFitted)?;
        Ok(x.dot(coef) + self.intercept)
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }
}

fn soft_threshold(x: f64, t: f64) -> f64 {
    if x > t {
        x - t
    } else if x < -t {
        x + t
    } else {
        0.0
    }
}

/// Logistic regression fit by gradient descent, one-vs-rest for more than
/// two classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub c: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tol: f64,
    classes: Vec<f64>,
    /// one row of weights per class
    weights: Option<Array2<f64>>,
    intercepts: Vec<f64>,
    is_fitted: bool,
}

impl LogisticRegression {
    pub fn new(c: f64, max_iter: usize) -> Self {
        Self {
            c,
            learning_rate: 0.1,
            max_iter,
            tol: 1e-6,
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
        let mut weights = Array2::zeros((classes.len(), d));
        let mut intercepts = vec![0.0f64; classes.len()];
        // inverse of C gives the L2 strength
        let l2 = if self.c > 0.0 { 1.0 / self.c } else { 0.0 };

        for (ci, &class) in classes.iter().enumerate() {
            let target: Array1<f64> = y
                .iter()
                .map(|&v| if (v - class).abs() < 1e-9 { 1.0 } else { 0.0 })
                .collect();
            let (w, b) = self.fit_binary(x, &target, l2)?;
            weights.row_mut(ci).assign(&w);
            intercepts[ci] = b;
        }

        self.classes = classes;
        self.weights = Some(weights);
        self.intercepts = intercepts;
        self.is_fitted = true;
        Ok(self)
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>, l2: f64) -> Result<(Array1<f64>, f64)> {
        let n = x.nrows() as f64;
        let d = x.ncols();
        let mut w = Array1::<f64>::zeros(d);
        let mut b = 0.0f64;

        for _ in 0..self.max_iter {
            let z = x.dot(&w) + b;
            let p = z.mapv(|v| 1.0 / (1.0 + (-v).exp()));
            let err = &p - y;

            let grad_w = (x.t().dot(&err) + l2 * &w) / n;
            let grad_b = err.sum() / n;

            w -= &(self.learning_rate * &grad_w);
            b -= self.learning_rate * grad_b;

            let grad_norm = grad_w.dot(&grad_w).sqrt() + grad_b.abs();
            if grad_norm < self.tol {
                break;
            }
        }
        Ok((w, b))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or(MlError::NotFitted)?;

        let labels: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = x.row(i);
                let mut best = 0usize;
                let mut best_score = f64::NEG_INFINITY;
                for (ci, w) in weights.axis_iter(Axis(0)).enumerate() {
                    let score: f64 = row.dot(&w) + self.intercepts[ci];
                    if score > best_score {
                        best_score = score;
                        best = ci;
                    }
                }
                self.classes[best]
            })
            .collect();
        Ok(Array1::from_vec(labels))
    }

    /// Mean absolute weight per feature, across the one-vs-rest models.
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

pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MlError::Training(format!(
            "feature rows ({}) and target length ({}) differ",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(MlError::Training("empty training set".to_string()));
    }
    Ok(())
}

pub(crate) fn sorted_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.to_vec();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_recovers_line() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0]; // y = 2x + 1
        let mut model = LinearRegression::new(0.0);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&array![[5.0]]).unwrap();
        assert!((pred[0] - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut ols = LinearRegression::new(0.0);
        ols.fit(&x, &y).unwrap();
        let mut ridge = LinearRegression::new(10.0);
        ridge.fit(&x, &y).unwrap();

        let c_ols = ols.coefficients().unwrap()[0];
        let c_ridge = ridge.coefficients().unwrap()[0];
        assert!(c_ridge.abs() < c_ols.abs());
    }

    #[test]
    fn test_lasso_zeroes_irrelevant_feature() {
        // second feature is pure noise around zero with no signal
        let x = array![
            [1.0, 0.01],
            [2.0, -0.02],
            [3.0, 0.015],
            [4.0, -0.01],
            [5.0, 0.02],
            [6.0, -0.015],
        ];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0];

        let mut model = Lasso::new(0.5);
        model.fit(&x, &y).unwrap();
        let coef = model.coefficients().unwrap();
        assert!(coef[0] > 1.0, "signal feature should survive, got {}", coef[0]);
        assert_eq!(coef[1], 0.0, "noise feature should be zeroed");
    }

    #[test]
    fn test_logistic_separable_binary() {
        let x = array![[0.0], [0.5], [1.0], [5.0], [5.5], [6.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = LogisticRegression::new(1.0, 500);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&array![[0.2], [5.8]]).unwrap();
        assert_eq!(pred[0], 0.0);
        assert_eq!(pred[1], 1.0);
    }

    #[test]
    fn test_logistic_three_classes() {
        let x = array![
            [0.0, 0.0], [0.2, 0.1], [0.1, 0.2],
            [5.0, 0.0], [5.2, 0.1], [5.1, 0.2],
            [0.0, 5.0], [0.2, 5.1], [0.1, 5.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let mut model = LogisticRegression::new(1.0, 1000);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let correct = pred
            .iter()
            .zip(y.iter())
            .filter(|(a, b)| (**a - **b).abs() < 1e-9)
            .count();
        assert!(correct >= 8, "expected near-perfect fit, got {correct}/9");
    }

    #[test]
    fn test_single_class_is_error() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let mut model = LogisticRegression::new(1.0, 100);
        assert!(model.fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit_is_error() {
        let model = LinearRegression::new(0.0);
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(MlError::NotFitted)
        ));
    }
}
