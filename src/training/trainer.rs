//! Training orchestration
//!
//! Validates the request, extracts matrices, builds a fresh estimator from
//! the registry, evaluates it, and packages an artifact for persistence.
//! Bad configuration surfaces as error values, never panics.

use crate::dataset::{
    partition_columns, split_indices, take_rows, take_values, to_feature_matrix,
    to_target_vector, RANDOM_SEED,
};
use crate::error::{MlError, Result};
use crate::training::cross_validation::{cross_validate, mean_std};
use crate::training::metrics::{
    accuracy, calinski_harabasz_score, mean_absolute_error, mean_squared_error, r2_score,
    silhouette_score, weighted_prf,
};
use crate::training::registry::{
    build_clustering, build_reduction, build_supervised, default_model, ClusteringModel,
    ModelKind, ModelParams, ReductionModel, SupervisedModel, TaskType,
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

const TEST_FRACTION: f64 = 0.2;
const CV_FOLDS: usize = 5;
const PREVIEW_ROWS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct TrainRequest {
    pub task_type: TaskType,
    pub target_column: Option<String>,
    pub model_type: Option<ModelKind>,
    #[serde(default)]
    pub params: ModelParams,
}

/// Task-shaped metric block, serialized flat.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskMetrics {
    Classification {
        accuracy: f64,
        precision: f64,
        recall: f64,
        f1_score: f64,
        cv_scores: Vec<f64>,
        cv_mean: f64,
        cv_std: f64,
    },
    Regression {
        r2_score: f64,
        mean_squared_error: f64,
        mean_absolute_error: f64,
        cv_scores: Vec<f64>,
        cv_mean: f64,
        cv_std: f64,
    },
    Clustering {
        silhouette_score: Option<f64>,
        calinski_harabasz_score: Option<f64>,
        inertia: Option<f64>,
    },
    Reduction {
        explained_variance_ratio: Option<Vec<f64>>,
        cumulative_variance: Option<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub importance: f64,
}

/// The persistable part of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub task_type: TaskType,
    pub model_type: ModelKind,
    pub target_column: Option<String>,
    pub feature_names: Vec<String>,
    pub model: ArtifactModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArtifactModel {
    Supervised(SupervisedModel),
    Clustering(ClusteringModel),
    Reduction(ReductionModel),
}

/// Outcome returned to the caller. The artifact is persisted separately and
/// never serialized into the response body.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub task_type: TaskType,
    pub model_type: ModelKind,
    pub results: TaskMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<Vec<FeatureWeight>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed_preview: Option<Vec<Vec<f64>>>,
    #[serde(skip)]
    pub artifact: TrainedArtifact,
}

/// Train one model over a numeric frame.
pub fn train(df: &DataFrame, request: &TrainRequest) -> Result<TrainReport> {
    let task = request.task_type;
    let model_kind = request.model_type.unwrap_or_else(|| default_model(task));

    let supervised = matches!(task, TaskType::Classification | TaskType::Regression);
    let target = match (&request.target_column, supervised) {
        (Some(name), _) => {
            if df.column(name.as_str()).is_err() {
                return Err(MlError::Config(format!(
                    "target column {name} not found in dataset"
                )));
            }
            Some(name.as_str())
        }
        (None, true) => {
            return Err(MlError::Config(format!(
                "task {task} requires a target column"
            )))
        }
        (None, false) => None,
    };

    let (feature_names, _) = partition_columns(df, target);
    if feature_names.is_empty() {
        return Err(MlError::Config(
            "no numeric feature columns available for training".to_string(),
        ));
    }

    let x = to_feature_matrix(df, &feature_names)?;
    tracing::info!(
        task = %task,
        model = %model_kind,
        rows = x.nrows(),
        features = x.ncols(),
        "training model"
    );

    match task {
        TaskType::Classification | TaskType::Regression => {
            let target = target.ok_or_else(|| {
                MlError::Config(format!("task {task} requires a target column"))
            })?;
            let y = to_target_vector(df, target)?;

            let (train_idx, test_idx) = split_indices(x.nrows(), TEST_FRACTION, RANDOM_SEED);
            let x_train = take_rows(&x, &train_idx);
            let y_train = take_values(&y, &train_idx);
            let x_test = take_rows(&x, &test_idx);
            let y_test = take_values(&y, &test_idx);

            let mut model = build_supervised(task, model_kind, &request.params)?;
            model.fit(&x_train, &y_train)?;
            let pred = model.predict(&x_test)?;

            let cv_scores = cross_validate(
                task,
                model_kind,
                &request.params,
                &x_train,
                &y_train,
                CV_FOLDS,
            )?;
            let (cv_mean, cv_std) = mean_std(&cv_scores);

            let results = match task {
                TaskType::Classification => {
                    let (precision, recall, f1) = weighted_prf(&y_test, &pred);
                    TaskMetrics::Classification {
                        accuracy: accuracy(&y_test, &pred),
                        precision,
                        recall,
                        f1_score: f1,
                        cv_scores,
                        cv_mean,
                        cv_std,
                    }
                }
                _ => TaskMetrics::Regression {
                    r2_score: r2_score(&y_test, &pred),
                    mean_squared_error: mean_squared_error(&y_test, &pred),
                    mean_absolute_error: mean_absolute_error(&y_test, &pred),
                    cv_scores,
                    cv_mean,
                    cv_std,
                },
            };

            let feature_importance = model
                .feature_importances()
                .map(|weights| rank_features(&feature_names, &weights));

            Ok(TrainReport {
                task_type: task,
                model_type: model_kind,
                results,
                feature_importance,
                transformed_preview: None,
                artifact: TrainedArtifact {
                    task_type: task,
                    model_type: model_kind,
                    target_column: Some(target.to_string()),
                    feature_names,
                    model: ArtifactModel::Supervised(model),
                },
            })
        }
        TaskType::Clustering => {
            let (train_idx, test_idx) = split_indices(x.nrows(), TEST_FRACTION, RANDOM_SEED);
            let x_train = take_rows(&x, &train_idx);
            let x_test = take_rows(&x, &test_idx);

            let mut model = build_clustering(model_kind, &request.params)?;
            model.fit_predict(&x_train)?;
            let labels = holdout_cluster_labels(&mut model, &x_test);

            let (silhouette, calinski) = match &labels {
                Some(labels) => {
                    let silhouette = match silhouette_score(&x_test, labels) {
                        Ok(s) => Some(s),
                        Err(e) => {
                            tracing::warn!(error = %e, "silhouette unavailable");
                            None
                        }
                    };
                    let calinski = match calinski_harabasz_score(&x_test, labels) {
                        Ok(s) => Some(s),
                        Err(e) => {
                            tracing::warn!(error = %e, "calinski-harabasz unavailable");
                            None
                        }
                    };
                    (silhouette, calinski)
                }
                None => (None, None),
            };

            Ok(TrainReport {
                task_type: task,
                model_type: model_kind,
                results: TaskMetrics::Clustering {
                    silhouette_score: silhouette,
                    calinski_harabasz_score: calinski,
                    inertia: model.inertia(),
                },
                feature_importance: None,
                transformed_preview: None,
                artifact: TrainedArtifact {
                    task_type: task,
                    model_type: model_kind,
                    target_column: None,
                    feature_names,
                    model: ArtifactModel::Clustering(model),
                },
            })
        }
        TaskType::DimensionalityReduction => {
            let (train_idx, _) = split_indices(x.nrows(), TEST_FRACTION, RANDOM_SEED);
            let x_train = take_rows(&x, &train_idx);

            let mut model = build_reduction(model_kind, &request.params)?;
            let transformed = model.fit_transform(&x_train)?;

            let explained = model
                .explained_variance_ratio()
                .map(|r| r.to_vec());
            let cumulative = explained.as_ref().map(|ratios| {
                ratios
                    .iter()
                    .scan(0.0, |acc, &v| {
                        *acc += v;
                        Some(*acc)
                    })
                    .collect()
            });

            let preview: Vec<Vec<f64>> = transformed
                .outer_iter()
                .take(PREVIEW_ROWS)
                .map(|row| row.to_vec())
                .collect();

            Ok(TrainReport {
                task_type: task,
                model_type: model_kind,
                results: TaskMetrics::Reduction {
                    explained_variance_ratio: explained,
                    cumulative_variance: cumulative,
                },
                feature_importance: None,
                transformed_preview: Some(preview),
                artifact: TrainedArtifact {
                    task_type: task,
                    model_type: model_kind,
                    target_column: None,
                    feature_names,
                    model: ArtifactModel::Reduction(model),
                },
            })
        }
    }
}

/// Label the held-out rows of a fitted clustering model. Models without an
/// out-of-sample `predict` are refit on the holdout; when that also fails
/// the evaluation metrics are simply omitted.
fn holdout_cluster_labels(
    model: &mut ClusteringModel,
    x_test: &ndarray::Array2<f64>,
) -> Option<ndarray::Array1<i64>> {
    match model.predict(x_test) {
        Ok(labels) => Some(labels),
        Err(_) => match model.fit_predict(x_test) {
            Ok(labels) => Some(labels),
            Err(e) => {
                tracing::warn!(error = %e, "could not label held-out rows");
                None
            }
        },
    }
}

fn rank_features(names: &[String], weights: &[f64]) -> Vec<FeatureWeight> {
    let mut ranked: Vec<FeatureWeight> = names
        .iter()
        .zip(weights.iter())
        .map(|(name, &importance)| FeatureWeight {
            feature: name.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Persist a trained artifact as JSON.
pub fn save_model(artifact: &TrainedArtifact, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(file, artifact)?;
    Ok(())
}

/// Load a previously saved artifact.
pub fn load_model(path: &Path) -> Result<TrainedArtifact> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn classification_frame() -> DataFrame {
        let n = 40;
        let x1: Vec<f64> = (0..n).map(|i| i as f64 / 4.0).collect();
        let x2: Vec<f64> = (0..n).map(|i| (i % 7) as f64).collect();
        let y: Vec<i64> = (0..n).map(|i| i64::from(i >= n / 2)).collect();
        df!(
            "x1" => x1,
            "x2" => x2,
            "label" => y,
        )
        .unwrap()
    }

    #[test]
    fn test_classification_end_to_end() {
        let df = classification_frame();
        let request = TrainRequest {
            task_type: TaskType::Classification,
            target_column: Some("label".to_string()),
            model_type: None,
            params: ModelParams::default(),
        };

        let report = train(&df, &request).unwrap();
        assert_eq!(report.model_type, ModelKind::LogisticRegression);
        match report.results {
            TaskMetrics::Classification {
                accuracy,
                precision,
                recall,
                f1_score,
                ref cv_scores,
                ..
            } => {
                for v in [accuracy, precision, recall, f1_score] {
                    assert!((0.0..=1.0).contains(&v), "metric out of range: {v}");
                }
                assert_eq!(cv_scores.len(), 5);
            }
            _ => panic!("expected classification metrics"),
        }
        assert!(report.feature_importance.is_some());
    }

    #[test]
    fn test_missing_target_is_config_error() {
        let df = classification_frame();
        let request = TrainRequest {
            task_type: TaskType::Regression,
            target_column: None,
            model_type: None,
            params: ModelParams::default(),
        };
        assert!(matches!(train(&df, &request), Err(MlError::Config(_))));
    }

    #[test]
    fn test_unknown_target_is_config_error() {
        let df = classification_frame();
        let request = TrainRequest {
            task_type: TaskType::Classification,
            target_column: Some("absent".to_string()),
            model_type: None,
            params: ModelParams::default(),
        };
        assert!(matches!(train(&df, &request), Err(MlError::Config(_))));
    }

    #[test]
    fn test_wrong_model_for_task_is_config_error() {
        let df = classification_frame();
        let request = TrainRequest {
            task_type: TaskType::Classification,
            target_column: Some("label".to_string()),
            model_type: Some(ModelKind::LinearRegression),
            params: ModelParams::default(),
        };
        assert!(matches!(train(&df, &request), Err(MlError::Config(_))));
    }

    #[test]
    fn test_reduction_preview_capped_and_variance_bounded() {
        let n = 250;
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| (i * 2) as f64 + (i % 3) as f64).collect();
        let c: Vec<f64> = (0..n).map(|i| (i % 11) as f64).collect();
        let df = df!("a" => a, "b" => b, "c" => c).unwrap();

        let request = TrainRequest {
            task_type: TaskType::DimensionalityReduction,
            target_column: None,
            model_type: Some(ModelKind::Pca),
            params: ModelParams::default(),
        };
        let report = train(&df, &request).unwrap();

        let preview = report.transformed_preview.unwrap();
        assert_eq!(preview.len(), 100);
        match report.results {
            TaskMetrics::Reduction {
                explained_variance_ratio: Some(ratios),
                cumulative_variance: Some(cumulative),
            } => {
                let total: f64 = ratios.iter().sum();
                assert!(total <= 1.0 + 1e-9);
                assert!((cumulative.last().unwrap() - total).abs() < 1e-9);
            }
            _ => panic!("expected reduction metrics with variance"),
        }
    }

    fn blob_frame() -> DataFrame {
        // two tight blobs interleaved by row index
        let n = 60;
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 0..n {
            let offset = if i % 2 == 0 { 0.0 } else { 5.0 };
            xs.push(offset + (i / 2) as f64 * 0.01);
            ys.push(offset + (i / 2) as f64 * 0.02);
        }
        df!("x" => xs, "y" => ys).unwrap()
    }

    #[test]
    fn test_clustering_reports_inertia_for_kmeans() {
        let request = TrainRequest {
            task_type: TaskType::Clustering,
            target_column: None,
            model_type: None,
            params: ModelParams {
                n_clusters: Some(2),
                ..Default::default()
            },
        };
        let report = train(&blob_frame(), &request).unwrap();
        match report.results {
            TaskMetrics::Clustering {
                silhouette_score,
                inertia,
                ..
            } => {
                assert!(inertia.is_some());
                assert!(silhouette_score.unwrap() > 0.5);
            }
            _ => panic!("expected clustering metrics"),
        }
    }

    #[test]
    fn test_holdout_labels_cover_every_held_out_row() {
        let df = blob_frame();
        let names = vec!["x".to_string(), "y".to_string()];
        let x = to_feature_matrix(&df, &names).unwrap();
        let (train_idx, test_idx) = split_indices(x.nrows(), TEST_FRACTION, RANDOM_SEED);
        assert_eq!(test_idx.len(), 12);

        let params = ModelParams {
            n_clusters: Some(2),
            ..Default::default()
        };
        let mut model = build_clustering(ModelKind::Kmeans, &params).unwrap();
        model.fit_predict(&take_rows(&x, &train_idx)).unwrap();

        let labels = holdout_cluster_labels(&mut model, &take_rows(&x, &test_idx)).unwrap();
        assert_eq!(labels.len(), test_idx.len());
    }

    #[test]
    fn test_holdout_labels_refit_when_predict_is_unsupported() {
        let df = blob_frame();
        let names = vec!["x".to_string(), "y".to_string()];
        let x = to_feature_matrix(&df, &names).unwrap();
        let (train_idx, test_idx) = split_indices(x.nrows(), TEST_FRACTION, RANDOM_SEED);

        let params = ModelParams {
            n_clusters: Some(2),
            ..Default::default()
        };
        let mut model = build_clustering(ModelKind::Agglomerative, &params).unwrap();
        model.fit_predict(&take_rows(&x, &train_idx)).unwrap();

        let labels = holdout_cluster_labels(&mut model, &take_rows(&x, &test_idx)).unwrap();
        assert_eq!(labels.len(), test_idx.len());
    }

    #[test]
    fn test_cv_scores_come_from_the_train_partition() {
        // noisy labels, so folds drawn from different rows score differently
        let n = 40;
        let x1: Vec<f64> = (0..n).map(|i| i as f64 / 4.0).collect();
        let x2: Vec<f64> = (0..n).map(|i| ((i * 17) % 13) as f64).collect();
        let y: Vec<i64> = (0..n).map(|i| i64::from((i * 7) % 3 == 0)).collect();
        let df = df!("x1" => x1, "x2" => x2, "label" => y).unwrap();

        let request = TrainRequest {
            task_type: TaskType::Classification,
            target_column: Some("label".to_string()),
            model_type: Some(ModelKind::LogisticRegression),
            params: ModelParams::default(),
        };
        let report = train(&df, &request).unwrap();

        let names = vec!["x1".to_string(), "x2".to_string()];
        let x = to_feature_matrix(&df, &names).unwrap();
        let y = to_target_vector(&df, "label").unwrap();
        let (train_idx, _) = split_indices(x.nrows(), TEST_FRACTION, RANDOM_SEED);
        let expected = cross_validate(
            TaskType::Classification,
            ModelKind::LogisticRegression,
            &ModelParams::default(),
            &take_rows(&x, &train_idx),
            &take_values(&y, &train_idx),
            CV_FOLDS,
        )
        .unwrap();

        match report.results {
            TaskMetrics::Classification { cv_scores, .. } => assert_eq!(cv_scores, expected),
            _ => panic!("expected classification metrics"),
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let df = classification_frame();
        let request = TrainRequest {
            task_type: TaskType::Classification,
            target_column: Some("label".to_string()),
            model_type: Some(ModelKind::DecisionTree),
            params: ModelParams::default(),
        };
        let report = train(&df, &request).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trained_model_test.json");
        save_model(&report.artifact, &path).unwrap();

        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.model_type, ModelKind::DecisionTree);
        assert_eq!(loaded.feature_names, vec!["x1", "x2"]);
    }
}
