//! segmenter_server — REST surface over the segmenter core service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
