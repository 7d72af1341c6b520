//! Error types for the serving process

use crate::error::PrepError;
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

    #[error("Preprocessing error: {0}")]
    Prep(#[from] PrepError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Prep(e) => match e {
                PrepError::UnsupportedInput(_)
                | PrepError::ColumnNotFound(_)
                | PrepError::UnsupportedFormat(_)
                | PrepError::LabelNotSet => (StatusCode::BAD_REQUEST, e.to_string()),
                PrepError::ArtifactMismatch { .. } => {
                    tracing::error!(detail = %e, "artifact pair is torn");
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
                other => {
                    tracing::error!(detail = %other, "preprocessing error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Preprocessing failed. Check server logs for details.".to_string(),
                    )
                }
            },
            ServerError::Json(_) => (StatusCode::BAD_REQUEST, "Invalid JSON format".to_string()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
