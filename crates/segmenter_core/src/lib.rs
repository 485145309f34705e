//! Segmenter core — users, segments and membership reconciliation.
//!
//! Pure domain crate: value types, the `SegmentStore` port implemented by
//! `segmenter_postgres`, and the `SegmentService` the HTTP layer calls.
//! An in-memory store lives in [`memory`] for tests and database-less runs.

pub mod error;
pub mod memory;
pub mod ports;
pub mod service;
pub mod types;

pub use error::SegmenterError;
pub use ports::SegmentStore;
pub use service::{SegmentService, SegmentServiceImpl};
