//! Categorical encoders
//!
//! One-hot (drop-first), label, target-mean, and out-of-fold target encoding.

use crate::dataset::RANDOM_SEED;
use crate::error::{MlError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One-hot encoder with the first (alphabetically) category dropped per
/// column. Unknown categories at transform time produce all-zero rows,
/// indistinguishable from the dropped baseline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Per column: kept categories, sorted, baseline removed.
    columns: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.columns.clear();
        for name in columns {
            let categories = sorted_categories(df, name)?;
            if categories.is_empty() {
                return Err(MlError::Data(format!("column {name} has no categories")));
            }
            // drop the first as baseline
            self.columns.push((name.clone(), categories[1..].to_vec()));
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Expanded indicator columns named `{col}_{category}`, k-1 per input
    /// column, in fit order.
    pub fn transform(&self, df: &DataFrame) -> Result<Vec<Series>> {
        if !self.is_fitted {
            return Err(MlError::NotFitted);
        }

        let mut out = Vec::new();
        for (name, kept) in &self.columns {
            let series = df
                .column(name.as_str())
                .map_err(|_| MlError::ColumnNotFound(name.clone()))?
                .as_materialized_series()
                .cast(&DataType::String)?;
            let ca = series.str()?;

            for category in kept {
                let indicator: Float64Chunked = ca
                    .into_iter()
                    .map(|opt| Some(if opt == Some(category.as_str()) { 1.0 } else { 0.0 }))
                    .collect();
                let col_name = format!("{name}_{category}");
                out.push(indicator.with_name(col_name.into()).into_series());
            }
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<Vec<Series>> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

/// Maps each category of one column to its sorted-order index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    mapping: HashMap<String, i64>,
    is_fitted: bool,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, df: &DataFrame, column: &str) -> Result<&mut Self> {
        self.mapping.clear();
        for (idx, category) in sorted_categories(df, column)?.into_iter().enumerate() {
            self.mapping.insert(category, idx as i64);
        }
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, df: &DataFrame, column: &str) -> Result<Series> {
        if !self.is_fitted {
            return Err(MlError::NotFitted);
        }

        let series = df
            .column(column)
            .map_err(|_| MlError::ColumnNotFound(column.to_string()))?
            .as_materialized_series()
            .cast(&DataType::String)?;

        let encoded: Int64Chunked = series
            .str()?
            .into_iter()
            .map(|opt| {
                opt.and_then(|v| self.mapping.get(v).copied())
            })
            .collect();

        if encoded.null_count() > series.null_count() {
            return Err(MlError::Data(format!(
                "column {column} contains categories not seen during fit"
            )));
        }
        Ok(encoded.with_name(column.into()).into_series())
    }

    pub fn fit_transform(&mut self, df: &DataFrame, column: &str) -> Result<Series> {
        self.fit(df, column)?;
        self.transform(df, column)
    }
}

/// Replace each category with the mean of the target over its rows.
pub fn target_encode(df: &DataFrame, column: &str, target: &str) -> Result<Series> {
    let (categories, targets) = category_target_pairs(df, column, target)?;

    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for (cat, y) in categories.iter().zip(targets.iter()) {
        if let (Some(cat), Some(y)) = (cat, y) {
            let entry = sums.entry(cat.as_str()).or_insert((0.0, 0));
            entry.0 += y;
            entry.1 += 1;
        }
    }

    let global_mean = mean_of(&targets);
    let means: HashMap<&str, f64> = sums
        .into_iter()
        .map(|(cat, (sum, count))| (cat, sum / count as f64))
        .collect();

    let encoded: Float64Chunked = categories
        .iter()
        .map(|opt| {
            Some(match opt {
                Some(cat) => means.get(cat.as_str()).copied().unwrap_or(global_mean),
                None => global_mean,
            })
        })
        .collect();
    Ok(encoded.with_name(column.into()).into_series())
}

/// Out-of-fold target encoding: each row's value is the category mean
/// computed from the other folds only, so no row sees its own target.
/// Categories absent from the other folds fall back to those folds' overall
/// target mean.
pub fn kfold_target_encode(
    df: &DataFrame,
    column: &str,
    target: &str,
    n_folds: usize,
) -> Result<Series> {
    let (categories, targets) = category_target_pairs(df, column, target)?;
    let n = categories.len();
    if n_folds < 2 || n < n_folds {
        // not enough rows to hold folds out, use the plain encoding
        return target_encode(df, column, target);
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(RANDOM_SEED);
    indices.shuffle(&mut rng);

    let mut encoded = vec![0.0f64; n];
    let base = n / n_folds;
    let remainder = n % n_folds;
    let mut start = 0;

    for fold in 0..n_folds {
        let size = base + usize::from(fold < remainder);
        let holdout = &indices[start..start + size];
        start += size;

        let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
        let mut train_sum = 0.0;
        let mut train_count = 0usize;
        let holdout_set: BTreeSet<usize> = holdout.iter().copied().collect();
        for i in 0..n {
            if holdout_set.contains(&i) {
                continue;
            }
            if let (Some(cat), Some(y)) = (&categories[i], &targets[i]) {
                let entry = sums.entry(cat.as_str()).or_insert((0.0, 0));
                entry.0 += y;
                entry.1 += 1;
                train_sum += y;
                train_count += 1;
            }
        }
        let train_mean = if train_count > 0 {
            train_sum / train_count as f64
        } else {
            0.0
        };
        let means: HashMap<&str, f64> = sums
            .into_iter()
            .map(|(cat, (sum, count))| (cat, sum / count as f64))
            .collect();

        for &i in holdout {
            encoded[i] = match &categories[i] {
                Some(cat) => means.get(cat.as_str()).copied().unwrap_or(train_mean),
                None => train_mean,
            };
        }
    }

    let out: Float64Chunked = encoded.into_iter().map(Some).collect();
    Ok(out.with_name(column.into()).into_series())
}

fn sorted_categories(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let series = df
        .column(column)
        .map_err(|_| MlError::ColumnNotFound(column.to_string()))?
        .as_materialized_series()
        .cast(&DataType::String)?;

    let set: BTreeSet<String> = series
        .str()?
        .into_iter()
        .flatten()
        .map(|s| s.to_string())
        .collect();
    Ok(set.into_iter().collect())
}

fn category_target_pairs(
    df: &DataFrame,
    column: &str,
    target: &str,
) -> Result<(Vec<Option<String>>, Vec<Option<f64>>)> {
    let categories: Vec<Option<String>> = df
        .column(column)
        .map_err(|_| MlError::ColumnNotFound(column.to_string()))?
        .as_materialized_series()
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|opt| opt.map(|s| s.to_string()))
        .collect();

    let targets: Vec<Option<f64>> = df
        .column(target)
        .map_err(|_| MlError::ColumnNotFound(target.to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|_| {
            MlError::Config(format!(
                "target column {target} must be numeric for target encoding"
            ))
        })?
        .f64()?
        .into_iter()
        .collect();

    Ok((categories, targets))
}

fn mean_of(values: &[Option<f64>]) -> f64 {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    }
}
