//! Heuristic dataset analysis
//!
//! Deterministic decision tree over summary statistics, used whenever the
//! generative path is unconfigured, unreachable, or unparseable.

use crate::dataset::{datetime_columns, partition_columns, skewness};
use crate::insight::parser::{ParsedInsights, DEFAULT_TASK};
use polars::prelude::*;
use std::collections::HashMap;

/// Analyze a dataset without any network dependency.
pub fn analyze_heuristically(
    columns: &[String],
    missing_values: &HashMap<String, u64>,
    df: Option<&DataFrame>,
) -> ParsedInsights {
    let mut insights = Vec::new();

    match df {
        Some(df) => insights.push(format!(
            "Dataset contains {} rows and {} columns",
            df.height(),
            df.width()
        )),
        None => insights.push(format!("Dataset contains {} columns", columns.len())),
    }

    let missing_cols: Vec<&String> = columns
        .iter()
        .filter(|c| missing_values.get(*c).copied().unwrap_or(0) > 0)
        .collect();
    if missing_cols.is_empty() {
        insights.push("No missing values detected in the dataset".to_string());
    } else {
        let shown: Vec<&str> = missing_cols.iter().take(3).map(|c| c.as_str()).collect();
        let ellipsis = if missing_cols.len() > 3 { "..." } else { "" };
        insights.push(format!(
            "Missing values detected in {} columns: {}{ellipsis}",
            missing_cols.len(),
            shown.join(", ")
        ));
    }

    let Some(df) = df else {
        insights.push("Cannot perform detailed analysis without DataFrame object".to_string());
        return ParsedInsights {
            insights,
            suggested_task_type: DEFAULT_TASK.to_string(),
            suggested_target_column: None,
        };
    };

    let (numeric, categorical) = partition_columns(df, None);
    let datetime = datetime_columns(df);
    let datetime_note = if datetime.is_empty() {
        String::new()
    } else {
        format!(", and {} datetime", datetime.len())
    };
    insights.push(format!(
        "Dataset contains {} numeric, {} categorical{datetime_note} columns",
        numeric.len(),
        categorical.len()
    ));

    let mut task = DEFAULT_TASK.to_string();
    let mut target: Option<String> = None;

    // first low-cardinality categorical column makes a classification target
    for col in &categorical {
        if let Ok(series) = df.column(col.as_str()) {
            let series = series.as_materialized_series().drop_nulls();
            let uniques = match series.n_unique() {
                Ok(u) => u,
                Err(_) => continue,
            };
            if (2..=10).contains(&uniques) {
                let balance = match majority_share(&series) {
                    Some(share) if share < 0.7 => "balanced",
                    _ => "imbalanced",
                };
                insights.push(format!(
                    "Column '{col}' has {uniques} unique values with {balance} distribution"
                ));
                task = "classification".to_string();
                target = Some(col.clone());
                break;
            }
        }
    }

    // otherwise a continuous numeric column makes a regression target
    if target.is_none() {
        for col in &numeric {
            if let Ok(series) = df.column(col.as_str()) {
                let series = series.as_materialized_series();
                let uniques = match series.n_unique() {
                    Ok(u) => u,
                    Err(_) => continue,
                };
                if uniques > 20 {
                    let skew = skewness(series).ok().flatten().unwrap_or(0.0);
                    let desc = if skew.abs() > 1.0 {
                        "highly skewed"
                    } else {
                        "relatively normal"
                    };
                    insights.push(format!(
                        "Column '{col}' has continuous values with {desc} distribution (skew: {skew:.2})"
                    ));
                    task = "regression".to_string();
                    target = Some(col.clone());
                    break;
                }
            }
        }
    }

    if target.is_none() && !datetime.is_empty() {
        insights.push(format!(
            "Time-based column '{}' detected, suggesting time series analysis potential",
            datetime[0]
        ));
        task = "time_series".to_string();
        target = numeric.first().cloned();
    }

    if target.is_none() && task == DEFAULT_TASK {
        insights.push(
            "No obvious target variables detected, suggesting clustering for exploratory analysis"
                .to_string(),
        );
    }

    ParsedInsights {
        insights,
        suggested_task_type: task,
        suggested_target_column: target,
    }
}

/// Share of the most frequent value among non-null entries.
fn majority_share(series: &Series) -> Option<f64> {
    let casted = series.cast(&DataType::String).ok()?;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in casted.str().ok()?.into_iter().flatten() {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return None;
    }
    counts
        .values()
        .max()
        .map(|&max| max as f64 / total as f64)
}
