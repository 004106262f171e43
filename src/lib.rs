//! ModelForge - tabular ML training service
//!
//! Upload a CSV, get insights and suggestions, preprocess it, train a model,
//! and download the artifacts, all over a small REST API.
//!
//! # Modules
//!
//! - [`dataset`] - CSV loading, summaries, feature matrix extraction
//! - [`preprocessing`] - Missing-value handling, scaling, categorical encoding
//! - [`training`] - Estimators, model registry, training orchestration
//! - [`insight`] - Dataset insight advisor (generative API + heuristics)
//! - [`server`] - HTTP server with REST API

pub mod dataset;
pub mod error;
pub mod insight;
pub mod preprocessing;
pub mod server;
pub mod training;

pub use error::{MlError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::dataset::{read_csv_bytes, read_csv_path, write_csv, DatasetSummary};
    pub use crate::error::{MlError, Result};
    pub use crate::insight::{DatasetAdvisor, InsightReport};
    pub use crate::preprocessing::{
        preprocess, suggest_missing_strategy, Encoding, MissingStrategy, PreprocessConfig,
    };
    pub use crate::server::{run_server, ServerConfig};
    pub use crate::training::{
        train, ModelKind, ModelParams, TaskType, TrainReport, TrainRequest,
    };
}
