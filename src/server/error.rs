//! Error types for the server

use crate::error::MlError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ml(#[from] MlError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ServerError::Io(e) => {
                tracing::error!(detail = %e, "IO error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A file system error occurred".to_string(),
                )
            }
            ServerError::Ml(e) => match e {
                MlError::Config(_)
                | MlError::Validation(_)
                | MlError::Data(_)
                | MlError::ColumnNotFound(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                _ => {
                    tracing::error!(detail = %e, "Processing error");
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
            },
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
