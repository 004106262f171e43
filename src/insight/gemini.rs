//! Gemini text-completion client
//!
//! Thin async wrapper over the `generateContent` endpoint. The advisor treats
//! every failure here as "fall back to heuristics", so errors carry enough
//! context to log and nothing more.

use crate::error::{MlError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/";
const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";
const TIMEOUT_SECS: u64 = 30;

/// Low temperature keeps replies close to the requested format.
const TEMPERATURE: f32 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 1000;

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| MlError::InsightApi(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            client,
        })
    }

    /// Send one prompt and return the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![Part {
                    text: prompt.to_owned(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        // {base_url}{model}:generateContent?key={api_key}
        let url = format!(
            "{}{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| MlError::InsightApi(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::InsightApi(format!("API error {status}: {body}")));
        }

        let result: GeminiResponse = response
            .json()
            .await
            .map_err(|e| MlError::InsightApi(format!("malformed response body: {e}")))?;

        extract_text(&result)
            .ok_or_else(|| MlError::InsightApi("no response content from API".to_string()))
    }
}

// Candidates may be absent, empty, or blocked by safety filters.
fn extract_text(response: &GeminiResponse) -> Option<String> {
    let candidate = response.candidates.as_ref()?.first()?;
    if matches!(
        candidate.finish_reason.as_deref(),
        Some("SAFETY") | Some("BLOCKED")
    ) {
        return None;
    }
    let parts = candidate.content.as_ref()?.parts.as_ref()?;
    parts.first().map(|p| p.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_response() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "- A bullet insight"}]},
                "finishReason": "STOP"
            }]
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(&response).as_deref(), Some("- A bullet insight"));
    }

    #[test]
    fn test_empty_or_null_candidates_yield_nothing() {
        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(extract_text(&empty).is_none());

        let null: GeminiResponse = serde_json::from_str(r#"{"candidates": null}"#).unwrap();
        assert!(extract_text(&null).is_none());
    }

    #[test]
    fn test_safety_blocked_response_yields_nothing() {
        let json = r#"{"candidates": [{"content": null, "finishReason": "SAFETY"}]}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(extract_text(&response).is_none());
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = GeminiRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![Part {
                    text: "hello".to_owned(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1000);
    }
}
