//! Missing-value strategist

use crate::dataset::{partition_columns, skewness};
use crate::error::{MlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How to handle missing values during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStrategy {
    Mean,
    Median,
    Mode,
    Drop,
}

impl FromStr for MissingStrategy {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "mode" => Ok(Self::Mode),
            "drop" => Ok(Self::Drop),
            other => Err(MlError::Config(format!(
                "unknown missing-value strategy: {other}"
            ))),
        }
    }
}

impl fmt::Display for MissingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Drop => "drop",
        };
        f.write_str(s)
    }
}

/// Recommend an imputation strategy for a dataset.
///
/// Decision order:
/// 1. no missing values anywhere -> mean (a no-op when applied)
/// 2. any column missing more than half its values -> drop
/// 3. missing values in numeric columns -> median if any numeric column is
///    strongly skewed (|skew| > 1), else mean
/// 4. missing values only in categorical columns -> mode
/// 5. otherwise -> mean
pub fn suggest_missing_strategy(df: &DataFrame) -> Result<MissingStrategy> {
    let n_rows = df.height();
    let total_missing: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
    if total_missing == 0 {
        return Ok(MissingStrategy::Mean);
    }

    if n_rows > 0 {
        for col in df.get_columns() {
            if col.null_count() as f64 / n_rows as f64 > 0.5 {
                return Ok(MissingStrategy::Drop);
            }
        }
    }

    let (numeric, categorical) = partition_columns(df, None);

    let numeric_missing = numeric
        .iter()
        .any(|name| df.column(name.as_str()).map(|c| c.null_count() > 0).unwrap_or(false));
    if numeric_missing {
        for name in &numeric {
            let series = df.column(name.as_str())?.as_materialized_series();
            if let Some(skew) = skewness(series)? {
                if skew.abs() > 1.0 {
                    return Ok(MissingStrategy::Median);
                }
            }
        }
        return Ok(MissingStrategy::Mean);
    }

    let categorical_missing = categorical
        .iter()
        .any(|name| df.column(name.as_str()).map(|c| c.null_count() > 0).unwrap_or(false));
    if categorical_missing {
        return Ok(MissingStrategy::Mode);
    }

    Ok(MissingStrategy::Mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_missing_suggests_mean() {
        let df = df!(
            "a" => &[1.0, 2.0, 3.0],
            "b" => &["x", "y", "z"],
        )
        .unwrap();
        assert_eq!(suggest_missing_strategy(&df).unwrap(), MissingStrategy::Mean);
    }

    #[test]
    fn test_mostly_missing_column_suggests_drop() {
        // "a" is 75% missing and strongly skewed; drop must win.
        let df = df!(
            "a" => &[Some(1000.0), None, None, None],
            "b" => &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert_eq!(suggest_missing_strategy(&df).unwrap(), MissingStrategy::Drop);
    }

    #[test]
    fn test_skewed_numeric_missing_suggests_median() {
        let df = df!(
            "a" => &[Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(2.0), Some(2.0), Some(90.0), None],
        )
        .unwrap();
        assert_eq!(suggest_missing_strategy(&df).unwrap(), MissingStrategy::Median);
    }

    #[test]
    fn test_symmetric_numeric_missing_suggests_mean() {
        let df = df!(
            "a" => &[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), None],
        )
        .unwrap();
        assert_eq!(suggest_missing_strategy(&df).unwrap(), MissingStrategy::Mean);
    }

    #[test]
    fn test_categorical_only_missing_suggests_mode() {
        let df = df!(
            "a" => &[1.0, 2.0, 3.0, 4.0],
            "b" => &[Some("x"), Some("y"), None, Some("x")],
        )
        .unwrap();
        assert_eq!(suggest_missing_strategy(&df).unwrap(), MissingStrategy::Mode);
    }

    #[test]
    fn test_strategy_parse_roundtrip() {
        for s in ["mean", "median", "mode", "drop"] {
            let parsed: MissingStrategy = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("zero".parse::<MissingStrategy>().is_err());
    }
}
