//! Missing-value imputation

use super::strategy::MissingStrategy;
use crate::dataset::column_role;
use crate::dataset::ColumnRole;
use crate::error::{MlError, Result};
use polars::prelude::*;
use std::collections::HashMap;

/// Applies one [`MissingStrategy`] to every affected column of a frame.
#[derive(Debug, Clone)]
pub struct Imputer {
    strategy: MissingStrategy,
}

impl Imputer {
    pub fn new(strategy: MissingStrategy) -> Self {
        Self { strategy }
    }

    /// Return a frame with missing values handled.
    ///
    /// mean/median fill numeric columns (cast to f64), mode fills every
    /// column with its most frequent value, drop removes rows with any null.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        match self.strategy {
            MissingStrategy::Drop => Ok(df.drop_nulls::<String>(None)?),
            MissingStrategy::Mean => self.fill_numeric(df, |values| {
                values.iter().sum::<f64>() / values.len() as f64
            }),
            MissingStrategy::Median => self.fill_numeric(df, median),
            MissingStrategy::Mode => self.fill_mode(df),
        }
    }

    fn fill_numeric<F>(&self, df: &DataFrame, fill: F) -> Result<DataFrame>
    where
        F: Fn(&[f64]) -> f64,
    {
        let mut result = df.clone();
        for col in df.get_columns() {
            if col.null_count() == 0 || column_role(col.dtype()) != ColumnRole::Numeric {
                continue;
            }

            let series = col.as_materialized_series().cast(&DataType::Float64)?;
            let values: Vec<f64> = series.f64()?.into_iter().flatten().collect();
            if values.is_empty() {
                return Err(MlError::Data(format!(
                    "column {} has no values to impute from",
                    col.name()
                )));
            }
            let value = fill(&values);

            let filled: Float64Chunked = series
                .f64()?
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(value)))
                .collect();
            result = result
                .with_column(filled.with_name(col.name().clone()).into_series())?
                .clone();
        }
        Ok(result)
    }

    fn fill_mode(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for col in df.get_columns() {
            if col.null_count() == 0 {
                continue;
            }

            match column_role(col.dtype()) {
                ColumnRole::Numeric => {
                    let series = col.as_materialized_series().cast(&DataType::Float64)?;
                    let values: Vec<f64> = series.f64()?.into_iter().flatten().collect();
                    let value = numeric_mode(&values).ok_or_else(|| {
                        MlError::Data(format!(
                            "column {} has no values to impute from",
                            col.name()
                        ))
                    })?;
                    let filled: Float64Chunked = series
                        .f64()?
                        .into_iter()
                        .map(|opt| Some(opt.unwrap_or(value)))
                        .collect();
                    result = result
                        .with_column(filled.with_name(col.name().clone()).into_series())?
                        .clone();
                }
                ColumnRole::Categorical => {
                    let series = col.as_materialized_series().cast(&DataType::String)?;
                    let ca = series.str()?;
                    let value = string_mode(ca).ok_or_else(|| {
                        MlError::Data(format!(
                            "column {} has no values to impute from",
                            col.name()
                        ))
                    })?;
                    let filled: StringChunked = ca
                        .into_iter()
                        .map(|opt| Some(opt.unwrap_or(value.as_str())))
                        .collect();
                    result = result
                        .with_column(filled.with_name(col.name().clone()).into_series())?
                        .clone();
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Most frequent value; ties broken by the smaller value for determinism.
fn numeric_mode(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<u64, (usize, f64)> = HashMap::new();
    for &v in values {
        let entry = counts.entry(v.to_bits()).or_insert((0, v));
        entry.0 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| {
            a.0.cmp(&b.0)
                .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        })
        .map(|(_, v)| v)
}

fn string_mode(ca: &StringChunked) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for opt in ca.into_iter() {
        if let Some(v) = opt {
            *counts.entry(v).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
        .map(|(v, _)| v.to_string())
}
