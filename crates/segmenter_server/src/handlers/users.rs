//! User handlers.
//!
//! POST   /api/user        — create users, per-id status map
//! GET    /api/user/:id    — user with its segment names
//! PATCH  /api/user/:id    — reconcile memberships, returns the updated user
//! DELETE /api/user/:id    — delete a user and its memberships

use std::sync::Arc;

use axum::{body::Bytes, extract::Path, http::StatusCode, Extension, Json};
use segmenter_core::{
    service::SegmentService,
    types::{UpdateUserParams, User, UserId, UserReport},
};
use serde::Deserialize;

use super::{parse_body, parse_user_id};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateUsersRequest {
    #[serde(default)]
    pub users: Option<Vec<UserId>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub add_segments: Option<Vec<String>>,
    #[serde(default)]
    pub delete_segments: Option<Vec<String>>,
}

pub async fn create_users(
    Extension(service): Extension<Arc<dyn SegmentService>>,
    body: Bytes,
) -> Result<(StatusCode, Json<UserReport>), AppError> {
    let req: CreateUsersRequest = parse_body(&body)?;
    let users = req.users.unwrap_or_default();
    tracing::debug!(?users, "create users request");
    let report = service.create_users(&users).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_user(
    Extension(service): Extension<Arc<dyn SegmentService>>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user_id = parse_user_id(&id)?;
    let user = service.get_user(user_id).await?;
    Ok(Json(user))
}

pub async fn update_user(
    Extension(service): Extension<Arc<dyn SegmentService>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<User>, AppError> {
    let user_id = parse_user_id(&id)?;
    let req: UpdateUserRequest = parse_body(&body)?;
    let params = UpdateUserParams {
        id: user_id,
        add_segments: req.add_segments.unwrap_or_default(),
        delete_segments: req.delete_segments.unwrap_or_default(),
    };
    tracing::debug!(
        user_id,
        add = ?params.add_segments,
        delete = ?params.delete_segments,
        "update user request"
    );

    service.update_user(params).await?;

    let user = service.get_user(user_id).await?;
    Ok(Json(user))
}

pub async fn delete_user(
    Extension(service): Extension<Arc<dyn SegmentService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_user_id(&id)?;
    service.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
