//! Standard (z-score) feature scaling

use crate::error::{MlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnParams {
    mean: f64,
    std: f64,
}

/// Z-score scaler over named numeric columns: (x - mean) / std.
/// Zero-variance columns scale with std 1 so they pass through centered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    params: HashMap<String, ColumnParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        for name in columns {
            let series = df
                .column(name.as_str())
                .map_err(|_| MlError::ColumnNotFound(name.clone()))?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let ca = series.f64()?;

            let mean = ca.mean().unwrap_or(0.0);
            let std = ca.std(1).unwrap_or(1.0);
            self.params.insert(
                name.clone(),
                ColumnParams {
                    mean,
                    std: if std == 0.0 { 1.0 } else { std },
                },
            );
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Builds all scaled columns first, then applies them in one pass.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(MlError::NotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .filter_map(|(name, params)| {
                df.column(name.as_str()).ok().map(|column| {
                    let series = column.as_materialized_series().cast(&DataType::Float64)?;
                    let scaled: Float64Chunked = series
                        .f64()?
                        .into_iter()
                        .map(|opt| opt.map(|v| (v - params.mean) / params.std))
                        .collect();
                    Ok(scaled.with_name(name.as_str().into()).into_series())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result = result.with_column(scaled)?.clone();
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}
