//! Preprocessing orchestration

use super::encoder::{kfold_target_encode, target_encode, LabelEncoder, OneHotEncoder};
use super::imputer::Imputer;
use super::scaler::StandardScaler;
use super::strategy::MissingStrategy;
use crate::dataset::partition_columns;
use crate::error::{MlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TARGET_ENCODE_FOLDS: usize = 5;

/// Categorical encoding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Onehot,
    Label,
    Target,
    Kfold,
}

impl FromStr for Encoding {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "onehot" => Ok(Self::Onehot),
            "label" => Ok(Self::Label),
            "target" => Ok(Self::Target),
            "kfold" => Ok(Self::Kfold),
            other => Err(MlError::Config(format!("unknown encoding: {other}"))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Onehot => "onehot",
            Self::Label => "label",
            Self::Target => "target",
            Self::Kfold => "kfold",
        };
        f.write_str(s)
    }
}

/// Full pipeline configuration for one preprocessing pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub missing_strategy: MissingStrategy,
    pub scaling: bool,
    pub encoding: Encoding,
    pub target_column: Option<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            missing_strategy: MissingStrategy::Mean,
            scaling: true,
            encoding: Encoding::Onehot,
            target_column: None,
        }
    }
}

impl PreprocessConfig {
    /// Target-based encodings require a numeric target column that exists in
    /// the frame. The same rule is enforced here and at the service boundary.
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        if let Some(name) = &self.target_column {
            if df.column(name.as_str()).is_err() {
                return Err(MlError::Config(format!(
                    "target column {name} not found in dataset"
                )));
            }
        }

        if matches!(self.encoding, Encoding::Target | Encoding::Kfold) {
            let name = self.target_column.as_deref().ok_or_else(|| {
                MlError::Config(format!(
                    "{} encoding requires a target column",
                    self.encoding
                ))
            })?;
            let col = df
                .column(name)
                .map_err(|_| MlError::Config(format!("target column {name} not found in dataset")))?;
            if !col.dtype().is_primitive_numeric() {
                return Err(MlError::Config(format!(
                    "{} encoding requires a numeric target column, {name} is {}",
                    self.encoding,
                    col.dtype()
                )));
            }
        }

        Ok(())
    }
}

/// Run the full pipeline: impute, partition, scale, encode, reassemble.
///
/// The returned frame holds numeric features first, expanded categorical
/// features second, and the untouched target column (when configured) last.
pub fn preprocess(df: &DataFrame, config: &PreprocessConfig) -> Result<DataFrame> {
    config.validate(df)?;

    let imputed = Imputer::new(config.missing_strategy).apply(df)?;
    if imputed.height() == 0 {
        return Err(MlError::Data(
            "no rows remain after missing-value handling".to_string(),
        ));
    }

    let target = config.target_column.as_deref();
    let (numeric, categorical) = partition_columns(&imputed, target);

    tracing::debug!(
        numeric = numeric.len(),
        categorical = categorical.len(),
        encoding = %config.encoding,
        scaling = config.scaling,
        "preprocessing frame"
    );

    let scaled = if config.scaling && !numeric.is_empty() {
        StandardScaler::new().fit_transform(&imputed, &numeric)?
    } else {
        imputed.clone()
    };

    let mut columns: Vec<Column> = Vec::new();
    for name in &numeric {
        columns.push(scaled.column(name.as_str())?.clone());
    }

    if !categorical.is_empty() {
        match config.encoding {
            Encoding::Onehot => {
                let encoded = OneHotEncoder::new().fit_transform(&imputed, &categorical)?;
                columns.extend(encoded.into_iter().map(Column::from));
            }
            Encoding::Label => {
                for name in &categorical {
                    let encoded = LabelEncoder::new().fit_transform(&imputed, name)?;
                    columns.push(encoded.into());
                }
            }
            Encoding::Target | Encoding::Kfold => {
                // validate() guarantees a numeric target here
                let target_name = self_target(config)?;
                for name in &categorical {
                    let encoded = match config.encoding {
                        Encoding::Target => target_encode(&imputed, name, target_name)?,
                        _ => kfold_target_encode(&imputed, name, target_name, TARGET_ENCODE_FOLDS)?,
                    };
                    columns.push(encoded.into());
                }
            }
        }
    }

    if let Some(name) = target {
        columns.push(imputed.column(name)?.clone());
    }

    if columns.is_empty() {
        return Err(MlError::Data(
            "no usable columns after preprocessing".to_string(),
        ));
    }

    Ok(DataFrame::new(columns)?)
}

fn self_target(config: &PreprocessConfig) -> Result<&str> {
    config
        .target_column
        .as_deref()
        .ok_or_else(|| MlError::Config("target column required".to_string()))
}
