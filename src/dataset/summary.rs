//! Upload-time dataset profile

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive statistics for one numeric column. Quantile keys follow the
/// familiar describe() labels so frontends can consume them unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

/// Read-only profile of an uploaded dataset, computed once per upload and
/// shared by the strategist and the insight advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub columns: Vec<String>,
    pub rows: usize,
    pub data_types: BTreeMap<String, String>,
    pub missing_values: BTreeMap<String, usize>,
    pub unique_values: BTreeMap<String, usize>,
    pub stats: BTreeMap<String, NumericStats>,
}

impl DatasetSummary {
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let mut data_types = BTreeMap::new();
        let mut missing_values = BTreeMap::new();
        let mut unique_values = BTreeMap::new();
        let mut stats = BTreeMap::new();

        for col in df.get_columns() {
            let name = col.name().to_string();
            data_types.insert(name.clone(), col.dtype().to_string());
            missing_values.insert(name.clone(), col.null_count());
            unique_values.insert(name.clone(), col.as_materialized_series().n_unique()?);

            if col.dtype().is_primitive_numeric() {
                let values: Vec<f64> = col
                    .as_materialized_series()
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .flatten()
                    .collect();
                if let Some(s) = numeric_stats(&values) {
                    stats.insert(name, s);
                }
            }
        }

        Ok(Self {
            columns,
            rows: df.height(),
            data_types,
            missing_values,
            unique_values,
            stats,
        })
    }

    /// Missing fraction of a column, 0.0 for unknown names.
    pub fn missing_fraction(&self, column: &str) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        let missing = self.missing_values.get(column).copied().unwrap_or(0);
        missing as f64 / self.rows as f64
    }
}

fn numeric_stats(values: &[f64]) -> Option<NumericStats> {
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Some(NumericStats {
        count: n,
        mean,
        std,
        min: sorted[0],
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.50),
        q75: quantile_sorted(&sorted, 0.75),
        max: sorted[n - 1],
    })
}

/// Linear-interpolation quantile over an already sorted slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}
