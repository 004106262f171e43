//! Preprocessing pipeline
//!
//! Imputation, scaling, and categorical encoding over polars DataFrames.
//! `preprocess` is the orchestration entry point used by the server.

mod encoder;
mod imputer;
mod pipeline;
mod scaler;
mod strategy;

pub use encoder::{kfold_target_encode, target_encode, LabelEncoder, OneHotEncoder};
pub use imputer::Imputer;
pub use pipeline::{preprocess, Encoding, PreprocessConfig};
pub use scaler::StandardScaler;
pub use strategy::{suggest_missing_strategy, MissingStrategy};
