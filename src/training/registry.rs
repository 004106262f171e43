//! Task/model registry and the stateless model factory
//!
//! Every build call constructs a fresh estimator from validated parameters;
//! nothing fitted is ever shared between requests.

use crate::error::{MlError, Result};
use crate::training::boosting::{GradientBoostingClassifier, GradientBoostingRegressor};
use crate::training::clustering::{Agglomerative, Dbscan, KMeans};
use crate::training::forest::RandomForest;
use crate::training::knn::{KNearestNeighbors, KnnTask};
use crate::training::linear::{Lasso, LinearRegression, LogisticRegression};
use crate::training::reduction::{Pca, Tsne};
use crate::training::svm::{LinearSvc, LinearSvr};
use crate::training::tree::{DecisionTree, SplitCriterion};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Classification,
    Regression,
    Clustering,
    DimensionalityReduction,
}

impl FromStr for TaskType {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classification" => Ok(Self::Classification),
            "regression" => Ok(Self::Regression),
            "clustering" => Ok(Self::Clustering),
            "dimensionality_reduction" => Ok(Self::DimensionalityReduction),
            other => Err(MlError::Config(format!("unsupported task type: {other}"))),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Classification => "classification",
            Self::Regression => "regression",
            Self::Clustering => "clustering",
            Self::DimensionalityReduction => "dimensionality_reduction",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    DecisionTree,
    RandomForest,
    GradientBoosting,
    Svm,
    Knn,
    LinearRegression,
    Ridge,
    Lasso,
    Svr,
    Kmeans,
    Dbscan,
    Agglomerative,
    Pca,
    Tsne,
}

impl FromStr for ModelKind {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "logistic_regression" => Ok(Self::LogisticRegression),
            "decision_tree" => Ok(Self::DecisionTree),
            "random_forest" => Ok(Self::RandomForest),
            "gradient_boosting" => Ok(Self::GradientBoosting),
            "svm" => Ok(Self::Svm),
            "knn" => Ok(Self::Knn),
            "linear_regression" => Ok(Self::LinearRegression),
            "ridge" => Ok(Self::Ridge),
            "lasso" => Ok(Self::Lasso),
            "svr" => Ok(Self::Svr),
            "kmeans" => Ok(Self::Kmeans),
            "dbscan" => Ok(Self::Dbscan),
            "agglomerative" => Ok(Self::Agglomerative),
            "pca" => Ok(Self::Pca),
            "tsne" => Ok(Self::Tsne),
            other => Err(MlError::Config(format!("unknown model type: {other}"))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LogisticRegression => "logistic_regression",
            Self::DecisionTree => "decision_tree",
            Self::RandomForest => "random_forest",
            Self::GradientBoosting => "gradient_boosting",
            Self::Svm => "svm",
            Self::Knn => "knn",
            Self::LinearRegression => "linear_regression",
            Self::Ridge => "ridge",
            Self::Lasso => "lasso",
            Self::Svr => "svr",
            Self::Kmeans => "kmeans",
            Self::Dbscan => "dbscan",
            Self::Agglomerative => "agglomerative",
            Self::Pca => "pca",
            Self::Tsne => "tsne",
        };
        f.write_str(s)
    }
}

/// Models allowed for each task, and the default used when a request names
/// no model.
pub fn models_for_task(task: TaskType) -> &'static [ModelKind] {
    match task {
        TaskType::Classification => &[
            ModelKind::LogisticRegression,
            ModelKind::DecisionTree,
            ModelKind::RandomForest,
            ModelKind::GradientBoosting,
            ModelKind::Svm,
            ModelKind::Knn,
        ],
        TaskType::Regression => &[
            ModelKind::LinearRegression,
            ModelKind::Ridge,
            ModelKind::Lasso,
            ModelKind::DecisionTree,
            ModelKind::RandomForest,
            ModelKind::GradientBoosting,
            ModelKind::Svr,
            ModelKind::Knn,
        ],
        TaskType::Clustering => &[
            ModelKind::Kmeans,
            ModelKind::Dbscan,
            ModelKind::Agglomerative,
        ],
        TaskType::DimensionalityReduction => &[ModelKind::Pca, ModelKind::Tsne],
    }
}

pub fn default_model(task: TaskType) -> ModelKind {
    match task {
        TaskType::Classification => ModelKind::LogisticRegression,
        TaskType::Regression => ModelKind::LinearRegression,
        TaskType::Clustering => ModelKind::Kmeans,
        TaskType::DimensionalityReduction => ModelKind::Pca,
    }
}

/// Hyperparameters accepted by the factory. The field set is closed:
/// unknown keys fail deserialization, and each model checks the fields it
/// consumes before fitting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParams {
    pub n_estimators: Option<usize>,
    pub max_depth: Option<usize>,
    pub n_neighbors: Option<usize>,
    pub alpha: Option<f64>,
    pub c: Option<f64>,
    pub learning_rate: Option<f64>,
    pub max_iter: Option<usize>,
    pub n_clusters: Option<usize>,
    pub eps: Option<f64>,
    pub min_samples: Option<usize>,
    pub n_components: Option<usize>,
}

impl ModelParams {
    /// Reject values that are out of range for any model, then reject
    /// fields the chosen model does not consume.
    pub fn validate_for(&self, model: ModelKind) -> Result<()> {
        if self.n_estimators == Some(0) {
            return Err(MlError::Config("n_estimators must be positive".to_string()));
        }
        if self.n_neighbors == Some(0) {
            return Err(MlError::Config("n_neighbors must be positive".to_string()));
        }
        if self.max_iter == Some(0) {
            return Err(MlError::Config("max_iter must be positive".to_string()));
        }
        if self.n_clusters == Some(0) {
            return Err(MlError::Config("n_clusters must be positive".to_string()));
        }
        if self.n_components == Some(0) {
            return Err(MlError::Config("n_components must be positive".to_string()));
        }
        if let Some(alpha) = self.alpha {
            if alpha < 0.0 {
                return Err(MlError::Config("alpha must be non-negative".to_string()));
            }
        }
        if let Some(c) = self.c {
            if c <= 0.0 {
                return Err(MlError::Config("c must be positive".to_string()));
            }
        }
        if let Some(lr) = self.learning_rate {
            if lr <= 0.0 {
                return Err(MlError::Config("learning_rate must be positive".to_string()));
            }
        }
        if let Some(eps) = self.eps {
            if eps <= 0.0 {
                return Err(MlError::Config("eps must be positive".to_string()));
            }
        }
        if self.min_samples == Some(0) {
            return Err(MlError::Config("min_samples must be positive".to_string()));
        }

        for (field, set) in self.unsupported_fields(model) {
            if set {
                return Err(MlError::Config(format!(
                    "parameter {field} is not supported by {model}"
                )));
            }
        }
        Ok(())
    }

    fn unsupported_fields(&self, model: ModelKind) -> Vec<(&'static str, bool)> {
        let allowed: &[&str] = match model {
            ModelKind::LogisticRegression => &["c", "max_iter"],
            ModelKind::DecisionTree => &["max_depth"],
            ModelKind::RandomForest => &["n_estimators", "max_depth"],
            ModelKind::GradientBoosting => &["n_estimators", "max_depth", "learning_rate"],
            ModelKind::Svm | ModelKind::Svr => &["c", "max_iter"],
            ModelKind::Knn => &["n_neighbors"],
            ModelKind::LinearRegression => &[],
            ModelKind::Ridge | ModelKind::Lasso => &["alpha", "max_iter"],
            ModelKind::Kmeans => &["n_clusters", "max_iter"],
            ModelKind::Dbscan => &["eps", "min_samples"],
            ModelKind::Agglomerative => &["n_clusters"],
            ModelKind::Pca | ModelKind::Tsne => &["n_components"],
        };

        let fields: [(&'static str, bool); 11] = [
            ("n_estimators", self.n_estimators.is_some()),
            ("max_depth", self.max_depth.is_some()),
            ("n_neighbors", self.n_neighbors.is_some()),
            ("alpha", self.alpha.is_some()),
            ("c", self.c.is_some()),
            ("learning_rate", self.learning_rate.is_some()),
            ("max_iter", self.max_iter.is_some()),
            ("n_clusters", self.n_clusters.is_some()),
            ("eps", self.eps.is_some()),
            ("min_samples", self.min_samples.is_some()),
            ("n_components", self.n_components.is_some()),
        ];
        fields
            .into_iter()
            .filter(|(name, _)| !allowed.contains(name))
            .collect()
    }
}

/// A freshly constructed supervised estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SupervisedModel {
    Logistic(LogisticRegression),
    Linear(LinearRegression),
    Lasso(Lasso),
    Tree(DecisionTree),
    Forest(RandomForest),
    BoostingClassifier(GradientBoostingClassifier),
    BoostingRegressor(GradientBoostingRegressor),
    Svc(LinearSvc),
    Svr(LinearSvr),
    Knn(KNearestNeighbors),
}

impl SupervisedModel {
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Self::Logistic(m) => m.fit(x, y).map(|_| ()),
            Self::Linear(m) => m.fit(x, y).map(|_| ()),
            Self::Lasso(m) => m.fit(x, y).map(|_| ()),
            Self::Tree(m) => m.fit(x, y).map(|_| ()),
            Self::Forest(m) => m.fit(x, y).map(|_| ()),
            Self::BoostingClassifier(m) => m.fit(x, y).map(|_| ()),
            Self::BoostingRegressor(m) => m.fit(x, y).map(|_| ()),
            Self::Svc(m) => m.fit(x, y).map(|_| ()),
            Self::Svr(m) => m.fit(x, y).map(|_| ()),
            Self::Knn(m) => m.fit(x, y).map(|_| ()),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Self::Logistic(m) => m.predict(x),
            Self::Linear(m) => m.predict(x),
            Self::Lasso(m) => m.predict(x),
            Self::Tree(m) => m.predict(x),
            Self::Forest(m) => m.predict(x),
            Self::BoostingClassifier(m) => m.predict(x),
            Self::BoostingRegressor(m) => m.predict(x),
            Self::Svc(m) => m.predict(x),
            Self::Svr(m) => m.predict(x),
            Self::Knn(m) => m.predict(x),
        }
    }

    /// Native importances for tree ensembles, mean absolute coefficients
    /// for the linear family, nothing for k-NN.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            Self::Tree(m) => Some(m.feature_importances().to_vec()),
            Self::Forest(m) => m.feature_importances(),
            Self::BoostingClassifier(m) => m.feature_importances(),
            Self::BoostingRegressor(m) => m.feature_importances(),
            Self::Logistic(m) => m.mean_abs_coefficients(),
            Self::Svc(m) => m.mean_abs_coefficients(),
            Self::Svr(m) => m.abs_coefficients(),
            Self::Linear(m) => m
                .coefficients()
                .map(|c| c.iter().map(|v| v.abs()).collect()),
            Self::Lasso(m) => m
                .coefficients()
                .map(|c| c.iter().map(|v| v.abs()).collect()),
            Self::Knn(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClusteringModel {
    Kmeans(KMeans),
    Dbscan(Dbscan),
    Agglomerative(Agglomerative),
}

impl ClusteringModel {
    pub fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i64>> {
        match self {
            Self::Kmeans(m) => m.fit_predict(x),
            Self::Dbscan(m) => m.fit_predict(x),
            Self::Agglomerative(m) => m.fit_predict(x),
        }
    }

    /// Label rows the model was not fitted on. Agglomerative clustering has
    /// no out-of-sample assignment and always errors here.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        match self {
            Self::Kmeans(m) => m.predict(x),
            Self::Dbscan(m) => m.predict(x),
            Self::Agglomerative(_) => Err(MlError::Computation(
                "agglomerative clustering cannot label unseen rows".to_string(),
            )),
        }
    }

    pub fn inertia(&self) -> Option<f64> {
        match self {
            Self::Kmeans(m) => m.inertia,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReductionModel {
    Pca(Pca),
    Tsne(Tsne),
}

impl ReductionModel {
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Self::Pca(m) => m.fit_transform(x),
            Self::Tsne(m) => m.fit_transform(x),
        }
    }

    pub fn explained_variance_ratio(&self) -> Option<&[f64]> {
        match self {
            Self::Pca(m) => Some(&m.explained_variance_ratio),
            Self::Tsne(_) => None,
        }
    }
}

/// Build a fresh supervised estimator for (task, model). Errors when the
/// model does not belong to the task or a parameter is invalid.
pub fn build_supervised(
    task: TaskType,
    model: ModelKind,
    params: &ModelParams,
) -> Result<SupervisedModel> {
    check_membership(task, model)?;
    params.validate_for(model)?;

    let built = match (task, model) {
        (TaskType::Classification, ModelKind::LogisticRegression) => SupervisedModel::Logistic(
            LogisticRegression::new(params.c.unwrap_or(1.0), params.max_iter.unwrap_or(1000)),
        ),
        (TaskType::Classification, ModelKind::DecisionTree) => SupervisedModel::Tree(
            DecisionTree::new(SplitCriterion::Gini, params.max_depth.unwrap_or(10)),
        ),
        (TaskType::Classification, ModelKind::RandomForest) => {
            SupervisedModel::Forest(RandomForest::new(
                SplitCriterion::Gini,
                params.n_estimators.unwrap_or(100),
                params.max_depth.unwrap_or(10),
            ))
        }
        (TaskType::Classification, ModelKind::GradientBoosting) => {
            SupervisedModel::BoostingClassifier(GradientBoostingClassifier::new(
                params.n_estimators.unwrap_or(100),
                params.learning_rate.unwrap_or(0.1),
                params.max_depth.unwrap_or(3),
            ))
        }
        (TaskType::Classification, ModelKind::Svm) => SupervisedModel::Svc(LinearSvc::new(
            params.c.unwrap_or(1.0),
            params.max_iter.unwrap_or(100),
        )),
        (TaskType::Classification, ModelKind::Knn) => SupervisedModel::Knn(
            KNearestNeighbors::new(KnnTask::Classification, params.n_neighbors.unwrap_or(5)),
        ),
        (TaskType::Regression, ModelKind::LinearRegression) => {
            SupervisedModel::Linear(LinearRegression::new(0.0))
        }
        (TaskType::Regression, ModelKind::Ridge) => {
            SupervisedModel::Linear(LinearRegression::new(params.alpha.unwrap_or(1.0)))
        }
        (TaskType::Regression, ModelKind::Lasso) => {
            let mut lasso = Lasso::new(params.alpha.unwrap_or(1.0));
            if let Some(max_iter) = params.max_iter {
                lasso.max_iter = max_iter;
            }
            SupervisedModel::Lasso(lasso)
        }
        (TaskType::Regression, ModelKind::DecisionTree) => SupervisedModel::Tree(
            DecisionTree::new(SplitCriterion::Variance, params.max_depth.unwrap_or(10)),
        ),
        (TaskType::Regression, ModelKind::RandomForest) => {
            SupervisedModel::Forest(RandomForest::new(
                SplitCriterion::Variance,
                params.n_estimators.unwrap_or(100),
                params.max_depth.unwrap_or(10),
            ))
        }
        (TaskType::Regression, ModelKind::GradientBoosting) => {
            SupervisedModel::BoostingRegressor(GradientBoostingRegressor::new(
                params.n_estimators.unwrap_or(100),
                params.learning_rate.unwrap_or(0.1),
                params.max_depth.unwrap_or(3),
            ))
        }
        (TaskType::Regression, ModelKind::Svr) => SupervisedModel::Svr(LinearSvr::new(
            params.c.unwrap_or(1.0),
            params.max_iter.unwrap_or(100),
        )),
        (TaskType::Regression, ModelKind::Knn) => SupervisedModel::Knn(KNearestNeighbors::new(
            KnnTask::Regression,
            params.n_neighbors.unwrap_or(5),
        )),
        _ => {
            return Err(MlError::Config(format!(
                "{model} is not a supervised model for {task}"
            )))
        }
    };
    Ok(built)
}

pub fn build_clustering(model: ModelKind, params: &ModelParams) -> Result<ClusteringModel> {
    check_membership(TaskType::Clustering, model)?;
    params.validate_for(model)?;

    let built = match model {
        ModelKind::Kmeans => {
            let mut kmeans = KMeans::new(params.n_clusters.unwrap_or(3));
            if let Some(max_iter) = params.max_iter {
                kmeans.max_iter = max_iter;
            }
            ClusteringModel::Kmeans(kmeans)
        }
        ModelKind::Dbscan => ClusteringModel::Dbscan(Dbscan::new(
            params.eps.unwrap_or(0.5),
            params.min_samples.unwrap_or(5),
        )),
        ModelKind::Agglomerative => {
            ClusteringModel::Agglomerative(Agglomerative::new(params.n_clusters.unwrap_or(3)))
        }
        _ => unreachable!("membership checked above"),
    };
    Ok(built)
}

pub fn build_reduction(model: ModelKind, params: &ModelParams) -> Result<ReductionModel> {
    check_membership(TaskType::DimensionalityReduction, model)?;
    params.validate_for(model)?;

    let built = match model {
        ModelKind::Pca => ReductionModel::Pca(Pca::new(params.n_components.unwrap_or(2))),
        ModelKind::Tsne => ReductionModel::Tsne(Tsne::new(params.n_components.unwrap_or(2))),
        _ => unreachable!("membership checked above"),
    };
    Ok(built)
}

fn check_membership(task: TaskType, model: ModelKind) -> Result<()> {
    if !models_for_task(task).contains(&model) {
        return Err(MlError::Config(format!(
            "model {model} is not available for task {task}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_and_model_parse() {
        assert_eq!(
            "classification".parse::<TaskType>().unwrap(),
            TaskType::Classification
        );
        assert_eq!(
            "random_forest".parse::<ModelKind>().unwrap(),
            ModelKind::RandomForest
        );
        assert!("ranking".parse::<TaskType>().is_err());
        assert!("perceptron".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_defaults_per_task() {
        assert_eq!(
            default_model(TaskType::Classification),
            ModelKind::LogisticRegression
        );
        assert_eq!(
            default_model(TaskType::Regression),
            ModelKind::LinearRegression
        );
        assert_eq!(default_model(TaskType::Clustering), ModelKind::Kmeans);
        assert_eq!(
            default_model(TaskType::DimensionalityReduction),
            ModelKind::Pca
        );
    }

    #[test]
    fn test_wrong_task_model_pair_is_error() {
        let err = build_supervised(
            TaskType::Classification,
            ModelKind::Kmeans,
            &ModelParams::default(),
        );
        assert!(matches!(err, Err(MlError::Config(_))));
    }

    #[test]
    fn test_invalid_param_value_is_error() {
        let params = ModelParams {
            n_estimators: Some(0),
            ..Default::default()
        };
        let err = build_supervised(TaskType::Classification, ModelKind::RandomForest, &params);
        assert!(matches!(err, Err(MlError::Config(_))));
    }

    #[test]
    fn test_param_for_wrong_model_is_error() {
        let params = ModelParams {
            eps: Some(0.5),
            ..Default::default()
        };
        let err = build_supervised(TaskType::Classification, ModelKind::Knn, &params);
        assert!(matches!(err, Err(MlError::Config(_))));
    }

    #[test]
    fn test_unknown_param_key_fails_deserialization() {
        let raw = r#"{"n_estimators": 10, "bogus_knob": 3}"#;
        assert!(serde_json::from_str::<ModelParams>(raw).is_err());
    }

    #[test]
    fn test_factory_builds_fresh_instances() {
        let params = ModelParams {
            n_clusters: Some(2),
            ..Default::default()
        };
        let mut a = build_clustering(ModelKind::Kmeans, &params).unwrap();
        let b = build_clustering(ModelKind::Kmeans, &params).unwrap();

        let x = ndarray::array![[0.0, 0.0], [0.1, 0.1], [5.0, 5.0], [5.1, 5.1]];
        a.fit_predict(&x).unwrap();
        // fitting one instance must not leak into the other
        assert!(a.inertia().is_some());
        assert!(b.inertia().is_none());
    }
}
