//! Segment handlers.
//!
//! POST   /api/segment          — create segments, per-name status map
//! DELETE /api/segment/:name    — delete a segment and its memberships

use std::sync::Arc;

use axum::{body::Bytes, extract::Path, http::StatusCode, Extension, Json};
use segmenter_core::{service::SegmentService, types::SegmentReport};
use serde::Deserialize;

use super::parse_body;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateSegmentsRequest {
    /// `null` and a missing field both mean no segments.
    #[serde(default)]
    pub segments: Option<Vec<String>>,
}

pub async fn create_segments(
    Extension(service): Extension<Arc<dyn SegmentService>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SegmentReport>), AppError> {
    let req: CreateSegmentsRequest = parse_body(&body)?;
    let segments = req.segments.unwrap_or_default();
    tracing::debug!(?segments, "create segments request");
    let report = service.create_segments(&segments).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn delete_segment(
    Extension(service): Extension<Arc<dyn SegmentService>>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::debug!(segment = %name, "delete segment request");
    service.delete_segment(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
