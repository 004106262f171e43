//! Dataset insight advisor
//!
//! Produces human-readable insights plus a suggested task type and target
//! column for an uploaded dataset. The primary path prompts a generative
//! API and parses its free-text reply; heuristics over the summary are the
//! authoritative backstop whenever that path is unconfigured or fails.

mod gemini;
mod heuristics;
mod parser;

pub use gemini::GeminiClient;
pub use parser::{ParsedInsights, DEFAULT_TASK, VALID_TASK_TYPES};

use crate::error::{MlError, Result};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::HashMap;

const REQUIRED_SUMMARY_KEYS: [&str; 3] = ["columns", "data_types", "missing_values"];

/// Which path produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorPath {
    /// Generative reply parsed successfully.
    Api,
    /// No API key configured.
    Heuristics,
    /// API replied but nothing recognizable could be parsed.
    HeuristicsAfterParseFailure,
    /// API call itself failed.
    HeuristicsAfterApiError,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    pub insights: Vec<String>,
    pub suggested_task_type: String,
    pub suggested_target_column: Option<String>,
    pub source: AdvisorPath,
}

impl InsightReport {
    fn from_parsed(parsed: ParsedInsights, source: AdvisorPath) -> Self {
        Self {
            insights: parsed.insights,
            suggested_task_type: parsed.suggested_task_type,
            suggested_target_column: parsed.suggested_target_column,
            source,
        }
    }
}

/// Stateless advisor shared across requests.
#[derive(Debug, Clone)]
pub struct DatasetAdvisor {
    gemini: Option<GeminiClient>,
}

impl DatasetAdvisor {
    /// Configure the generative path when a non-empty API key is given.
    pub fn new(api_key: Option<String>) -> Self {
        let gemini = match api_key {
            Some(key) if !key.is_empty() => match GeminiClient::new(key) {
                Ok(client) => {
                    tracing::info!("generative insight client configured");
                    Some(client)
                }
                Err(e) => {
                    tracing::error!(error = %e, "generative client setup failed, using heuristics");
                    None
                }
            },
            _ => {
                tracing::warn!("no API key configured, insight advisor will use heuristics");
                None
            }
        };
        Self { gemini }
    }

    /// Analyze a dataset summary, optionally with the frame itself for the
    /// heuristic path. The summary must carry the keys `columns`,
    /// `data_types`, and `missing_values`.
    pub async fn analyze(
        &self,
        summary: &serde_json::Value,
        df: Option<&DataFrame>,
    ) -> Result<InsightReport> {
        let (columns, missing_values) = validate_summary(summary)?;

        if let Some(client) = &self.gemini {
            let prompt = parser::build_prompt(
                &columns,
                &summary["data_types"],
                &summary["missing_values"],
            );
            match client.generate(&prompt).await {
                Ok(text) => match parser::parse_response(&text, &columns) {
                    Some(parsed) => {
                        return Ok(InsightReport::from_parsed(parsed, AdvisorPath::Api))
                    }
                    None => {
                        tracing::warn!("could not parse generative reply, using heuristics");
                        return Ok(InsightReport::from_parsed(
                            heuristics::analyze_heuristically(&columns, &missing_values, df),
                            AdvisorPath::HeuristicsAfterParseFailure,
                        ));
                    }
                },
                Err(e) => {
                    tracing::error!(error = %e, "generative call failed, using heuristics");
                    return Ok(InsightReport::from_parsed(
                        heuristics::analyze_heuristically(&columns, &missing_values, df),
                        AdvisorPath::HeuristicsAfterApiError,
                    ));
                }
            }
        }

        Ok(InsightReport::from_parsed(
            heuristics::analyze_heuristically(&columns, &missing_values, df),
            AdvisorPath::Heuristics,
        ))
    }
}

fn validate_summary(summary: &serde_json::Value) -> Result<(Vec<String>, HashMap<String, u64>)> {
    let object = summary
        .as_object()
        .ok_or_else(|| MlError::Validation("summary must be a JSON object".to_string()))?;

    for key in REQUIRED_SUMMARY_KEYS {
        if !object.contains_key(key) {
            return Err(MlError::Validation(format!(
                "summary must contain the following keys: {}",
                REQUIRED_SUMMARY_KEYS.join(", ")
            )));
        }
    }

    let columns: Vec<String> = object["columns"]
        .as_array()
        .ok_or_else(|| MlError::Validation("summary columns must be an array".to_string()))?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    let missing_values: HashMap<String, u64> = object["missing_values"]
        .as_object()
        .ok_or_else(|| MlError::Validation("summary missing_values must be an object".to_string()))?
        .iter()
        .map(|(k, v)| (k.clone(), v.as_u64().unwrap_or(0)))
        .collect();

    Ok((columns, missing_values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn summary_for(df: &DataFrame) -> serde_json::Value {
        let summary = crate::dataset::DatasetSummary::from_frame(df).unwrap();
        serde_json::to_value(&summary).unwrap()
    }

    #[tokio::test]
    async fn test_missing_required_key_fails_before_any_path() {
        let advisor = DatasetAdvisor::new(None);
        let summary = serde_json::json!({
            "columns": ["a"],
            "missing_values": {"a": 0},
        });
        let err = advisor.analyze(&summary, None).await;
        assert!(matches!(err, Err(MlError::Validation(_))));
    }

    #[tokio::test]
    async fn test_non_object_summary_fails() {
        let advisor = DatasetAdvisor::new(None);
        let err = advisor.analyze(&serde_json::json!([1, 2, 3]), None).await;
        assert!(matches!(err, Err(MlError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_advisor_uses_heuristics() {
        let df = df!(
            "age" => &[25i64, 30, 35, 40],
            "churn" => &["yes", "no", "yes", "no"],
        )
        .unwrap();
        let advisor = DatasetAdvisor::new(None);

        let report = advisor.analyze(&summary_for(&df), Some(&df)).await.unwrap();
        assert_eq!(report.source, AdvisorPath::Heuristics);
        assert_eq!(report.suggested_task_type, "classification");
        assert_eq!(report.suggested_target_column.as_deref(), Some("churn"));
    }

    #[tokio::test]
    async fn test_empty_api_key_means_heuristics() {
        let df = df!("x" => &[1.0, 2.0, 3.0]).unwrap();
        let advisor = DatasetAdvisor::new(Some(String::new()));

        let report = advisor.analyze(&summary_for(&df), Some(&df)).await.unwrap();
        assert_eq!(report.source, AdvisorPath::Heuristics);
    }
}
