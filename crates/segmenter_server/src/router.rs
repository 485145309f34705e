//! Router construction for the segmenter server.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Extension, Router,
};
use segmenter_core::service::SegmentService;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Build the full axum router with all routes and middleware.
pub fn build_router(service: Arc<dyn SegmentService>) -> Router {
    let api = Router::new()
        .route("/segment", post(handlers::segments::create_segments))
        .route("/segment/:name", delete(handlers::segments::delete_segment))
        .route("/user", post(handlers::users::create_users))
        .route(
            "/user/:id",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        );

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(service))
}
