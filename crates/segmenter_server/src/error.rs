//! Mapping of core errors onto HTTP responses.
//!
//! NotFound and AlreadyExists carry no body. Validation and internal errors
//! return `{"message": ...}` with a fixed text; internal detail only goes to
//! the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use segmenter_core::error::SegmenterError;
use serde::Serialize;

pub const VALIDATION_MESSAGE: &str = "validation error";
pub const INTERNAL_MESSAGE: &str = "internal error";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Handler error type.
#[derive(Debug)]
pub struct AppError(pub SegmenterError);

impl From<SegmenterError> for AppError {
    fn from(err: SegmenterError) -> Self {
        Self(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self(SegmenterError::Validation(err.to_string()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.0 {
            SegmenterError::NotFound(what) => {
                tracing::debug!(%what, "not found");
                status.into_response()
            }
            SegmenterError::AlreadyExists(what) => {
                tracing::debug!(%what, "already exists");
                status.into_response()
            }
            SegmenterError::Validation(detail) => {
                tracing::debug!(%detail, "validation error");
                message(status, VALIDATION_MESSAGE)
            }
            SegmenterError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                message(status, INTERNAL_MESSAGE)
            }
        }
    }
}

fn message(status: StatusCode, text: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            message: text.to_string(),
        }),
    )
        .into_response()
}
