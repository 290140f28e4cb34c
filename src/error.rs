use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::services::render_service::AnswerErrors;
use crate::services::schema_service::SchemaErrors;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Status transition {from} -> {to} is not allowed")]
    InvalidTransition { from: String, to: String },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid form schema: {0}")]
    Schema(#[from] SchemaErrors),

    #[error("Invalid answers: {0}")]
    Answers(#[from] AnswerErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, details) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            Error::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg, None),
            err @ Error::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string(), None),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            Error::Schema(err) => (
                StatusCode::BAD_REQUEST,
                "Invalid form schema".to_string(),
                Some(json!(err.violations())),
            ),
            Error::Answers(err) => (
                StatusCode::BAD_REQUEST,
                "Invalid answers".to_string(),
                Some(json!(err.violations())),
            ),
            Error::Database(err) => {
                tracing::error!(error = ?err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    None,
                )
            }
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                format!("External service error: {}", err),
                None,
            ),
            Error::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None),
            Error::Multipart(err) => (err.status(), err.body_text(), None),
            Error::Anyhow(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            Error::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
                None,
            ),
        };

        let body = match details {
            Some(details) => json!({ "error": error_message, "details": details }),
            None => json!({ "error": error_message }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
