//! Error types shared across the crate

use thiserror::Error;

/// Errors produced by the dataset, preprocessing, training, and insight layers.
#[derive(Error, Debug)]
pub enum MlError {
    /// Invalid caller-supplied configuration (bad task type, bad model for a
    /// task, missing target column, invalid encoding/target combination,
    /// rejected hyperparameter). Surfaced as a structured error value rather
    /// than a transport failure.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or unreadable input data
    #[error("Data error: {0}")]
    Data(String),

    /// Requested column does not exist in the dataset
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Structured input failed shape/key validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation requires a fitted model
    #[error("Model is not fitted")]
    NotFitted,

    /// Model fitting failed
    #[error("Training error: {0}")]
    Training(String),

    /// Numerical routine failed (singular system, divergence)
    #[error("Computation error: {0}")]
    Computation(String),

    /// Generative-language API round trip failed
    #[error("Insight API error: {0}")]
    InsightApi(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MlError>;
