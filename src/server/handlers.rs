//! HTTP request handlers
//!
//! Multi-file requests produce one result-or-error entry per file, keyed by
//! filename; a failure in one file never discards results for its siblings.

use std::path::{Path as FsPath, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{error, info};

use crate::dataset::{read_csv_bytes, write_csv, DatasetSummary};
use crate::error::MlError;
use crate::preprocessing::{
    preprocess as run_preprocess, suggest_missing_strategy, Encoding, MissingStrategy,
    PreprocessConfig,
};
use crate::training::{self, ModelKind, ModelParams, TaskType, TrainRequest};

use super::error::{Result, ServerError};
use super::state::AppState;

/// One uploaded file from a multipart request.
struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Files plus plain-text form fields from one multipart body.
struct MultipartForm {
    files: Vec<UploadedFile>,
    fields: std::collections::HashMap<String, String>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm> {
    let mut files = Vec::new();
    let mut fields = std::collections::HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let name = sanitize_filename(&file_name)?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?
                    .to_vec();
                info!(file = %name, bytes = bytes.len(), "received file");
                files.push(UploadedFile { name, bytes });
            }
            None => {
                let name = field.name().unwrap_or_default().to_string();
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                fields.insert(name, value);
            }
        }
    }

    if files.is_empty() {
        return Err(ServerError::BadRequest("No file uploaded".to_string()));
    }
    Ok(MultipartForm { files, fields })
}

/// Strip any path components; uploads are stored flat under the data dir.
fn sanitize_filename(name: &str) -> Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if base.is_empty() || base == "." || base.contains("..") {
        return Err(ServerError::BadRequest(format!(
            "invalid filename: {name}"
        )));
    }
    Ok(base)
}

fn save_upload(data_dir: &str, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = FsPath::new(data_dir).join(name);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

fn file_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

// ============================================================================
// Upload / profiling
// ============================================================================

/// Upload CSV files, returning a summary, insights, and suggestions per file.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    let form = read_multipart(multipart).await?;

    let mut results = serde_json::Map::new();
    for file in &form.files {
        let entry = match profile_file(&state, file).await {
            Ok(value) => value,
            Err(e) => {
                error!(file = %file.name, error = %e, "upload profiling failed");
                json!({ "error": e.to_string() })
            }
        };
        results.insert(file.name.clone(), entry);
    }

    Ok(Json(serde_json::Value::Object(results)))
}

async fn profile_file(
    state: &AppState,
    file: &UploadedFile,
) -> std::result::Result<serde_json::Value, MlError> {
    save_upload(&state.config.data_dir, &file.name, &file.bytes)
        .map_err(|e| MlError::Data(e.to_string()))?;
    let df = read_csv_bytes(&file.bytes)?;

    let summary = DatasetSummary::from_frame(&df)?;
    let summary_value = serde_json::to_value(&summary)?;
    let report = state.advisor.analyze(&summary_value, Some(&df)).await?;
    let missing_strategy = suggest_missing_strategy(&df)?;

    info!(
        file = %file.name,
        task = %report.suggested_task_type,
        target = report.suggested_target_column.as_deref().unwrap_or("none"),
        strategy = %missing_strategy,
        "profiled upload"
    );

    Ok(json!({
        "summary": summary_value,
        "insights": report.insights,
        "suggested_task_type": report.suggested_task_type,
        "suggested_target_column": report.suggested_target_column,
        "suggested_missing_strategy": missing_strategy.to_string(),
        "insight_source": report.source,
    }))
}

// ============================================================================
// Preprocessing
// ============================================================================

/// Preprocess uploaded files with the form-supplied configuration and store
/// the result as `preprocessed_{filename}`.
pub async fn preprocess(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    let form = read_multipart(multipart).await?;

    let scaling = match form.fields.get("scaling").map(String::as_str) {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") | None => false,
        Some(other) => {
            return Err(ServerError::BadRequest(format!(
                "invalid scaling value: {other}"
            )))
        }
    };
    let encoding = match form.fields.get("encoding") {
        Some(s) => Encoding::from_str(s)?,
        None => Encoding::Onehot,
    };
    let target_column = form
        .fields
        .get("target_column")
        .filter(|s| !s.is_empty())
        .cloned();
    let requested_strategy = form
        .fields
        .get("missing_strategy")
        .map(|s| MissingStrategy::from_str(s))
        .transpose()?;

    let mut results = serde_json::Map::new();
    for file in &form.files {
        let entry = (|| -> std::result::Result<serde_json::Value, MlError> {
            save_upload(&state.config.data_dir, &file.name, &file.bytes)
                .map_err(|e| MlError::Data(e.to_string()))?;
            let df = read_csv_bytes(&file.bytes)?;

            // without an explicit strategy, fall back to the suggestion
            let missing_strategy = match requested_strategy {
                Some(s) => s,
                None => suggest_missing_strategy(&df)?,
            };
            let config = PreprocessConfig {
                missing_strategy,
                scaling,
                encoding,
                target_column: target_column.clone(),
            };

            let mut processed = run_preprocess(&df, &config)?;
            let out_name = format!("preprocessed_{}", file.name);
            let out_path = FsPath::new(&state.config.data_dir).join(&out_name);
            write_csv(&mut processed, &out_path)?;

            info!(
                file = %file.name,
                output = %out_name,
                rows = processed.height(),
                columns = processed.width(),
                "preprocessed file"
            );

            Ok(json!({
                "preprocessed_file": out_name,
                "rows": processed.height(),
                "columns": processed.width(),
                "missing_strategy": missing_strategy.to_string(),
            }))
        })();

        let entry = match entry {
            Ok(value) => value,
            Err(e) => {
                error!(file = %file.name, error = %e, "preprocessing failed");
                json!({ "error": e.to_string() })
            }
        };
        results.insert(file.name.clone(), entry);
    }

    Ok(Json(serde_json::Value::Object(results)))
}

// ============================================================================
// Training
// ============================================================================

/// Train one model per uploaded file after default preprocessing, persisting
/// each fitted model as `trained_model_{stem}.json`.
pub async fn train(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    let form = read_multipart(multipart).await?;

    let task_type = form
        .fields
        .get("task_type")
        .ok_or_else(|| ServerError::BadRequest("task_type field is required".to_string()))?;
    let task_type = TaskType::from_str(task_type)?;
    let model_type = form
        .fields
        .get("model_type")
        .filter(|s| !s.is_empty())
        .map(|s| ModelKind::from_str(s))
        .transpose()?;
    let target_column = form
        .fields
        .get("target_column")
        .filter(|s| !s.is_empty())
        .cloned();
    let params: ModelParams = match form.fields.get("params") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ServerError::BadRequest(format!("invalid params: {e}")))?,
        None => ModelParams::default(),
    };

    let request = TrainRequest {
        task_type,
        target_column,
        model_type,
        params,
    };

    let mut results = serde_json::Map::new();
    for file in &form.files {
        let entry = match train_file(&state, file, &request) {
            Ok(value) => value,
            Err(e) => {
                error!(file = %file.name, error = %e, "training failed");
                json!({ "error": e.to_string() })
            }
        };
        results.insert(file.name.clone(), entry);
    }

    Ok(Json(serde_json::Value::Object(results)))
}

fn train_file(
    state: &AppState,
    file: &UploadedFile,
    request: &TrainRequest,
) -> std::result::Result<serde_json::Value, MlError> {
    save_upload(&state.config.data_dir, &file.name, &file.bytes)
        .map_err(|e| MlError::Data(e.to_string()))?;
    let df = read_csv_bytes(&file.bytes)?;

    // default preprocessing, keeping the target column intact
    let config = PreprocessConfig {
        target_column: request.target_column.clone(),
        ..PreprocessConfig::default()
    };
    let processed = run_preprocess(&df, &config)?;

    let report = training::train(&processed, request)?;

    let model_file = format!("trained_model_{}.json", file_stem(&file.name));
    let model_path = FsPath::new(&state.config.data_dir).join(&model_file);
    training::save_model(&report.artifact, &model_path)?;

    info!(
        file = %file.name,
        model = %report.model_type,
        artifact = %model_file,
        "trained model"
    );

    let mut entry = serde_json::to_value(&report)?;
    if let Some(object) = entry.as_object_mut() {
        object.insert("model_file".to_string(), json!(model_file));
        object.insert(
            "trained_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
    }
    Ok(entry)
}

// ============================================================================
// Downloads
// ============================================================================

/// Download a trained model artifact by original filename.
pub async fn download_model(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    let filename = sanitize_filename(&filename)?;
    let artifact = format!("trained_model_{}.json", file_stem(&filename));
    serve_file(&state.config.data_dir, &artifact, "application/json").await
}

/// Download a preprocessed CSV by original filename.
pub async fn download_preprocessed(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    let filename = sanitize_filename(&filename)?;
    let artifact = format!("preprocessed_{filename}");
    serve_file(&state.config.data_dir, &artifact, "text/csv").await
}

async fn serve_file(
    data_dir: &str,
    name: &str,
    content_type: &'static str,
) -> Result<impl IntoResponse> {
    let path = FsPath::new(data_dir).join(name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ServerError::NotFound(format!("File not found: {name}")))?;

    let disposition = format!("attachment; filename=\"{name}\"");
    Ok((
        StatusCode::OK,
        [
            (
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderValue::from_static(content_type),
            ),
            (
                axum::http::header::CONTENT_DISPOSITION,
                axum::http::HeaderValue::from_str(&disposition)
                    .map_err(|e| ServerError::Internal(format!("Invalid header: {e}")))?,
            ),
        ],
        bytes,
    ))
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_paths() {
        assert_eq!(sanitize_filename("data.csv").unwrap(), "data.csv");
        assert_eq!(sanitize_filename("dir/data.csv").unwrap(), "data.csv");
        assert_eq!(sanitize_filename("c:\\tmp\\data.csv").unwrap(), "data.csv");
    }

    #[test]
    fn test_sanitize_filename_rejects_traversal() {
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("a..b.csv").is_err());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("iris.csv"), "iris");
        assert_eq!(file_stem("archive.tar.gz"), "archive");
        assert_eq!(file_stem("noext"), "noext");
    }
}
