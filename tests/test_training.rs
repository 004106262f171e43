//! Integration test: training pipeline end-to-end

use modelforge::dataset::{split_indices, take_rows, to_feature_matrix, RANDOM_SEED};
use modelforge::error::MlError;
use modelforge::training::metrics::silhouette_score;
use modelforge::training::{
    load_model, save_model, train, KMeans, ModelKind, ModelParams, TaskMetrics, TaskType,
    TrainRequest,
};
use polars::prelude::*;

fn classification_df() -> DataFrame {
    let n = 40;
    let f1: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let f2: Vec<f64> = (0..n).map(|i| (n - i) as f64 * 0.5).collect();
    let target: Vec<i64> = (0..n).map(|i| i64::from(i >= n / 2)).collect();
    df!(
        "f1" => f1,
        "f2" => f2,
        "target" => target,
    )
    .unwrap()
}

fn regression_df() -> DataFrame {
    let n = 40;
    let x1: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let x2: Vec<f64> = (0..n).map(|i| (i % 5) as f64).collect();
    let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 3.0 * a + b + 1.0).collect();
    df!(
        "x1" => x1,
        "x2" => x2,
        "y" => y,
    )
    .unwrap()
}

fn request(task: TaskType, target: Option<&str>, model: Option<ModelKind>) -> TrainRequest {
    TrainRequest {
        task_type: task,
        target_column: target.map(str::to_string),
        model_type: model,
        params: ModelParams::default(),
    }
}

#[test]
fn test_classification_metrics_bounded_with_five_cv_scores() {
    let df = classification_df();
    let report = train(
        &df,
        &request(TaskType::Classification, Some("target"), None),
    )
    .unwrap();

    match report.results {
        TaskMetrics::Classification {
            accuracy,
            precision,
            recall,
            f1_score,
            cv_scores,
            cv_mean,
            ..
        } => {
            for v in [accuracy, precision, recall, f1_score, cv_mean] {
                assert!((0.0..=1.0).contains(&v), "metric out of [0,1]: {v}");
            }
            assert_eq!(cv_scores.len(), 5);
        }
        _ => panic!("expected classification metrics"),
    }
}

#[test]
fn test_regression_fits_linear_relationship() {
    let df = regression_df();
    let report = train(&df, &request(TaskType::Regression, Some("y"), None)).unwrap();

    match report.results {
        TaskMetrics::Regression {
            r2_score,
            mean_squared_error,
            ..
        } => {
            assert!(r2_score > 0.99, "linear data should fit well, r2={r2_score}");
            assert!(mean_squared_error < 1.0);
        }
        _ => panic!("expected regression metrics"),
    }
}

#[test]
fn test_unknown_model_for_task_is_error_value() {
    let df = classification_df();
    let result = train(
        &df,
        &request(
            TaskType::Classification,
            Some("target"),
            Some(ModelKind::Kmeans),
        ),
    );
    assert!(matches!(result, Err(MlError::Config(_))));

    // the factory holds no state, a valid follow-up request is unaffected
    let ok = train(
        &df,
        &request(TaskType::Classification, Some("target"), None),
    );
    assert!(ok.is_ok());
}

#[test]
fn test_rejected_hyperparameter_is_error_value() {
    let df = classification_df();
    let mut req = request(
        TaskType::Classification,
        Some("target"),
        Some(ModelKind::LogisticRegression),
    );
    req.params = ModelParams {
        eps: Some(0.5), // a clustering knob, not valid here
        ..Default::default()
    };
    assert!(matches!(train(&df, &req), Err(MlError::Config(_))));
}

#[test]
fn test_pca_preview_capped_at_100_rows_with_bounded_variance() {
    let n = 180;
    let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let b: Vec<f64> = (0..n).map(|i| (i as f64) * 0.3 + (i % 7) as f64).collect();
    let c: Vec<f64> = (0..n).map(|i| ((i * 13) % 29) as f64).collect();
    let df = df!("a" => a, "b" => b, "c" => c).unwrap();

    let report = train(
        &df,
        &request(
            TaskType::DimensionalityReduction,
            None,
            Some(ModelKind::Pca),
        ),
    )
    .unwrap();

    let preview = report.transformed_preview.expect("preview expected");
    assert_eq!(preview.len(), 100);
    assert_eq!(preview[0].len(), 2);

    match report.results {
        TaskMetrics::Reduction {
            explained_variance_ratio: Some(ratios),
            ..
        } => {
            assert!(ratios.iter().all(|r| (0.0..=1.0).contains(r)));
            assert!(ratios.iter().sum::<f64>() <= 1.0 + 1e-9);
        }
        _ => panic!("expected reduction metrics with variance ratios"),
    }
}

fn blob_df() -> DataFrame {
    let n = 60;
    let mut a = Vec::new();
    let mut b = Vec::new();
    for i in 0..n {
        let offset = if i % 2 == 0 { 0.0 } else { 6.0 };
        a.push(offset + (i / 2) as f64 * 0.02);
        b.push(offset + (i / 2) as f64 * 0.01);
    }
    df!("a" => a, "b" => b).unwrap()
}

#[test]
fn test_clustering_scores_the_held_out_rows() {
    let df = blob_df();
    let mut req = request(TaskType::Clustering, None, Some(ModelKind::Kmeans));
    req.params.n_clusters = Some(2);
    let report = train(&df, &req).unwrap();

    // an identically seeded reference run over the same 80/20 partition
    let names = vec!["a".to_string(), "b".to_string()];
    let x = to_feature_matrix(&df, &names).unwrap();
    let (train_idx, test_idx) = split_indices(x.nrows(), 0.2, RANDOM_SEED);
    let x_test = take_rows(&x, &test_idx);

    let mut reference = KMeans::new(2);
    reference.fit_predict(&take_rows(&x, &train_idx)).unwrap();
    let labels = reference.predict(&x_test).unwrap();
    let expected = silhouette_score(&x_test, &labels).unwrap();

    match report.results {
        TaskMetrics::Clustering {
            silhouette_score: Some(s),
            inertia,
            ..
        } => {
            assert!((s - expected).abs() < 1e-12, "silhouette {s} != {expected}");
            assert!(inertia.is_some());
        }
        _ => panic!("expected clustering metrics with a silhouette"),
    }
}

#[test]
fn test_agglomerative_clustering_reports_holdout_metrics() {
    let mut req = request(TaskType::Clustering, None, Some(ModelKind::Agglomerative));
    req.params.n_clusters = Some(2);
    let report = train(&blob_df(), &req).unwrap();

    match report.results {
        TaskMetrics::Clustering {
            silhouette_score,
            calinski_harabasz_score,
            inertia,
        } => {
            assert!(silhouette_score.unwrap() > 0.5);
            assert!(calinski_harabasz_score.is_some());
            assert!(inertia.is_none());
        }
        _ => panic!("expected clustering metrics"),
    }
}

#[test]
fn test_artifact_roundtrip_through_disk() {
    let df = regression_df();
    let report = train(
        &df,
        &request(
            TaskType::Regression,
            Some("y"),
            Some(ModelKind::RandomForest),
        ),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trained_model_houses.json");
    save_model(&report.artifact, &path).unwrap();

    let loaded = load_model(&path).unwrap();
    assert_eq!(loaded.model_type, ModelKind::RandomForest);
    assert_eq!(loaded.target_column.as_deref(), Some("y"));
    assert_eq!(loaded.feature_names, vec!["x1", "x2"]);
}
