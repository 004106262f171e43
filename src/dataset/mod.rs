//! Dataset layer
//!
//! Loads uploaded tabular files into polars DataFrames, derives read-only
//! summaries, and provides the shared helpers (column partition, feature
//! matrix extraction, seeded row splits) used by preprocessing and training.

mod loader;
mod summary;

pub use loader::{read_csv_bytes, read_csv_path, write_csv};
pub use summary::{DatasetSummary, NumericStats};

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Seed used for every stochastic step (splits, folds, model init) so that
/// repeated requests over the same file produce the same numbers.
pub const RANDOM_SEED: u64 = 42;

/// Semantic role of a column, inferred from its physical dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    Numeric,
    Categorical,
    DateTime,
    Other,
}

/// Map a polars dtype to its semantic role.
pub fn column_role(dtype: &DataType) -> ColumnRole {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => ColumnRole::Numeric,
        DataType::String | DataType::Categorical(_, _) | DataType::Boolean => {
            ColumnRole::Categorical
        }
        DataType::Date | DataType::Datetime(_, _) | DataType::Time => ColumnRole::DateTime,
        _ => ColumnRole::Other,
    }
}

/// Split column names into (numeric, categorical) feature sets, excluding
/// `exclude` (the target column) from both.
pub fn partition_columns(df: &DataFrame, exclude: Option<&str>) -> (Vec<String>, Vec<String>) {
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();

    for col in df.get_columns() {
        let name = col.name().to_string();
        if Some(name.as_str()) == exclude {
            continue;
        }
        match column_role(col.dtype()) {
            ColumnRole::Numeric => numeric.push(name),
            ColumnRole::Categorical => categorical.push(name),
            _ => {}
        }
    }

    (numeric, categorical)
}

/// Names of datetime-typed columns, in frame order.
pub fn datetime_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| column_role(c.dtype()) == ColumnRole::DateTime)
        .map(|c| c.name().to_string())
        .collect()
}

/// Non-null values of a column as f64.
pub fn column_values_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .map_err(|_| MlError::ColumnNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().flatten().collect())
}

/// Adjusted Fisher-Pearson skewness of a numeric column (the bias-corrected
/// estimator, matching what dataframe libraries report by default).
/// Returns None for fewer than 3 non-null values or zero variance.
pub fn skewness(series: &Series) -> Result<Option<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    let values: Vec<f64> = casted.f64()?.into_iter().flatten().collect();
    let n = values.len();
    if n < 3 {
        return Ok(None);
    }

    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / nf;

    if m2 <= f64::EPSILON {
        return Ok(None);
    }

    let g1 = m3 / m2.powf(1.5);
    let adjusted = g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0);
    Ok(Some(adjusted))
}

/// Extract the named columns as a dense `n_rows x n_cols` feature matrix.
/// Nulls become 0.0 (callers impute before reaching this point).
pub fn to_feature_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = columns.len();
    let mut x = Array2::zeros((n_rows, n_cols));

    for (j, name) in columns.iter().enumerate() {
        let series = df
            .column(name)
            .map_err(|_| MlError::ColumnNotFound(name.clone()))?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        for (i, value) in series.f64()?.into_iter().enumerate() {
            x[[i, j]] = value.unwrap_or(0.0);
        }
    }

    Ok(x)
}

/// Extract a single column as a target vector (cast to f64).
pub fn to_target_vector(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let series = df
        .column(name)
        .map_err(|_| MlError::ColumnNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

/// Shuffled train/test row indices with a fixed seed.
pub fn split_indices(n_rows: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n_rows as f64) * test_fraction).round() as usize;
    let n_test = n_test.min(n_rows.saturating_sub(1)).max(if n_rows > 1 { 1 } else { 0 });
    let test = indices[..n_test].to_vec();
    let train = indices[n_test..].to_vec();
    (train, test)
}

/// Select rows of a matrix by index.
pub fn take_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((indices.len(), x.ncols()));
    for (row, &i) in indices.iter().enumerate() {
        out.row_mut(row).assign(&x.row(i));
    }
    out
}

/// Select elements of a vector by index.
pub fn take_values(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    indices.iter().map(|&i| y[i]).collect()
}
