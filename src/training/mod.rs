//! Model training
//!
//! Estimators are plain structs with `fit`/`predict` methods over ndarray
//! matrices. The registry maps task and model names to concrete estimators,
//! and the trainer orchestrates splitting, fitting, and evaluation.

mod boosting;
mod clustering;
pub mod cross_validation;
mod forest;
mod knn;
mod linear;
pub mod metrics;
mod reduction;
pub mod registry;
mod svm;
mod trainer;
mod tree;

pub use boosting::{GradientBoostingClassifier, GradientBoostingRegressor};
pub use clustering::{Agglomerative, Dbscan, KMeans};
pub use forest::RandomForest;
pub use knn::{KNearestNeighbors, KnnTask};
pub use linear::{Lasso, LinearRegression, LogisticRegression};
pub use reduction::{Pca, Tsne};
pub use registry::{default_model, models_for_task, ModelKind, ModelParams, TaskType};
pub use svm::{LinearSvc, LinearSvr};
pub use trainer::{
    load_model, save_model, train, ArtifactModel, FeatureWeight, TaskMetrics, TrainReport,
    TrainRequest, TrainedArtifact,
};
pub use tree::{DecisionTree, SplitCriterion};
