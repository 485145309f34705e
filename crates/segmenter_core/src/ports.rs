//! Storage port trait.
//! Implemented by segmenter_postgres — the service depends only on this trait.

use async_trait::async_trait;

use crate::error::SegmenterError;
use crate::types::{User, UserId};

pub type Result<T> = std::result::Result<T, SegmenterError>;

/// Row-level operations on users, segments and memberships.
///
/// Expected conditions come back as `AlreadyExists` / `NotFound`;
/// everything else (connectivity, unexpected constraint failures) is
/// `Internal`.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Insert a segment. `AlreadyExists` if the name is taken.
    async fn create_segment(&self, name: &str) -> Result<()>;

    /// Delete a segment and, by cascade, every membership referencing it.
    /// `NotFound` if no segment had that name.
    async fn delete_segment(&self, name: &str) -> Result<()>;

    /// Insert a user. `AlreadyExists` if the id is taken.
    async fn create_user(&self, id: UserId) -> Result<()>;

    /// Delete a user and its memberships. `NotFound` if absent.
    async fn delete_user(&self, id: UserId) -> Result<()>;

    async fn is_user_created(&self, id: UserId) -> Result<bool>;

    /// Link a user to a segment by name.
    /// `NotFound` if the segment does not exist, `AlreadyExists` if the
    /// user is already a member.
    async fn add_user_to_segment(&self, user_id: UserId, segment: &str) -> Result<()>;

    /// Unlink a user from a segment by name.
    /// `NotFound` if the segment does not exist or the user is not a member.
    async fn delete_user_from_segment(&self, user_id: UserId, segment: &str) -> Result<()>;

    /// Load a user with its segment names. `NotFound` if absent.
    async fn get_user(&self, id: UserId) -> Result<User>;
}
