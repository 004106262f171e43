//! Integration test: insight advisor over real frames

use modelforge::dataset::DatasetSummary;
use modelforge::error::MlError;
use modelforge::insight::{AdvisorPath, DatasetAdvisor};
use polars::prelude::*;

fn summary_value(df: &DataFrame) -> serde_json::Value {
    let summary = DatasetSummary::from_frame(df).unwrap();
    serde_json::to_value(&summary).unwrap()
}

#[tokio::test]
async fn test_summary_missing_data_types_fails_before_analysis() {
    let advisor = DatasetAdvisor::new(None);
    let summary = serde_json::json!({
        "columns": ["age", "city"],
        "missing_values": {"age": 0, "city": 1},
    });

    let result = advisor.analyze(&summary, None).await;
    assert!(matches!(result, Err(MlError::Validation(_))));
}

#[tokio::test]
async fn test_heuristics_pick_low_cardinality_categorical_target() {
    let df = df!(
        "age" => &[25i64, 30, 35, 40, 45, 50],
        "income" => &[40_000.0, 52_000.0, 61_000.0, 48_000.0, 70_000.0, 55_000.0],
        "churn" => &["yes", "no", "yes", "no", "yes", "no"],
    )
    .unwrap();

    let advisor = DatasetAdvisor::new(None);
    let report = advisor.analyze(&summary_value(&df), Some(&df)).await.unwrap();

    assert_eq!(report.source, AdvisorPath::Heuristics);
    assert_eq!(report.suggested_task_type, "classification");
    assert_eq!(report.suggested_target_column.as_deref(), Some("churn"));
    assert!(report
        .insights
        .iter()
        .any(|i| i.contains("6 rows and 3 columns")));
}

#[tokio::test]
async fn test_heuristics_fall_through_to_regression() {
    let n = 30;
    let values: Vec<f64> = (0..n).map(|i| i as f64 * 3.3).collect();
    let ids: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let df = df!("id" => ids, "price" => values).unwrap();

    let advisor = DatasetAdvisor::new(None);
    let report = advisor.analyze(&summary_value(&df), Some(&df)).await.unwrap();

    assert_eq!(report.suggested_task_type, "regression");
    assert_eq!(report.suggested_target_column.as_deref(), Some("id"));
}

#[tokio::test]
async fn test_heuristics_default_to_clustering_without_targets() {
    // low-cardinality numerics only, nothing qualifies as a target
    let df = df!(
        "a" => &[1.0, 2.0, 1.0, 2.0, 1.0],
        "b" => &[0.0, 0.0, 1.0, 1.0, 0.0],
    )
    .unwrap();

    let advisor = DatasetAdvisor::new(None);
    let report = advisor.analyze(&summary_value(&df), Some(&df)).await.unwrap();

    assert_eq!(report.suggested_task_type, "clustering");
    assert!(report.suggested_target_column.is_none());
}

#[tokio::test]
async fn test_missing_value_insight_reported() {
    let df = df!(
        "x" => &[Some(1.0), None, Some(3.0)],
        "y" => &[Some("a"), Some("b"), None],
    )
    .unwrap();

    let advisor = DatasetAdvisor::new(None);
    let report = advisor.analyze(&summary_value(&df), Some(&df)).await.unwrap();

    assert!(report
        .insights
        .iter()
        .any(|i| i.contains("Missing values detected in 2 columns")));
}
