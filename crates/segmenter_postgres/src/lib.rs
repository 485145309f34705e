//! PostgreSQL adapter for the segmenter core.
//!
//! `PgSegmentStore` implements `segmenter_core::ports::SegmentStore` over a
//! shared `PgPool`; [`schema`] bootstraps the tables and the startup
//! connection.

pub mod schema;
pub mod store;

pub use schema::{connect_with_deadline, ensure_schema};
pub use store::PgSegmentStore;
