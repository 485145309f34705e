//! Domain value types shared by the store, the service and the HTTP layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// External user identifier. Matches the `INT` primary key of `users`.
pub type UserId = i32;

/// A user and the names of every segment it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub segments: Vec<String>,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            segments: Vec::new(),
        }
    }
}

/// Membership changes requested for a single user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateUserParams {
    pub id: UserId,
    pub add_segments: Vec<String>,
    pub delete_segments: Vec<String>,
}

/// Per-item result of a batch create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreateStatus {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "already exist")]
    AlreadyExist,
    #[serde(rename = "not created")]
    NotCreated,
}

impl CreateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyExist => "already exist",
            Self::NotCreated => "not created",
        }
    }
}

impl std::fmt::Display for CreateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segment name -> status, one entry per distinct name.
pub type SegmentReport = BTreeMap<String, CreateStatus>;

/// User id -> status, one entry per distinct id.
pub type UserReport = BTreeMap<UserId, CreateStatus>;

/// Outcome of applying one membership change during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipOutcome {
    Added,
    Removed,
    AlreadyExists,
    NotMember,
    SegmentMissing,
}

impl MembershipOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::AlreadyExists => "already_exists",
            Self::NotMember => "not_member",
            Self::SegmentMissing => "segment_missing",
        }
    }
}

impl std::fmt::Display for MembershipOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
