pub mod health;
pub mod segments;
pub mod users;

use axum::body::Bytes;
use segmenter_core::{error::SegmenterError, types::UserId};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Parse a `{id}` path segment as a user id.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    raw.parse::<UserId>().map_err(|e| {
        AppError(SegmenterError::Validation(format!(
            "user id '{raw}' is not an integer: {e}"
        )))
    })
}

/// Decode a JSON request body regardless of its `Content-Type`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    Ok(serde_json::from_slice(body)?)
}
