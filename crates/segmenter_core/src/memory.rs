//! In-memory `SegmentStore`.
//!
//! Mirrors the relational schema: users keyed by id, segments with a serial
//! id and a unique name, and a membership set of `(user_id, segment_id)`
//! pairs. Deleting a user or segment removes its memberships the same way
//! the `ON DELETE CASCADE` foreign keys do.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::SegmenterError;
use crate::ports::{Result, SegmentStore};
use crate::types::{User, UserId};

type SegmentId = i32;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeSet<UserId>,
    segments: HashMap<String, SegmentId>,
    next_segment_id: SegmentId,
    memberships: BTreeSet<(UserId, SegmentId)>,
}

impl Tables {
    fn segment_id(&self, name: &str) -> Result<SegmentId> {
        self.segments
            .get(name)
            .copied()
            .ok_or_else(|| SegmenterError::NotFound(format!("segment '{name}'")))
    }
}

/// Store backed by process memory. Used by tests and for running the server
/// without a database.
#[derive(Debug, Default)]
pub struct InMemorySegmentStore {
    tables: RwLock<Tables>,
    failing: RwLock<HashSet<&'static str>>,
}

impl InMemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call to `operation` (a `SegmentStore` method name)
    /// fail with an `Internal` error.
    pub async fn fail_operation(&self, operation: &'static str) {
        self.failing.write().await.insert(operation);
    }

    /// Number of membership rows referencing the named segment.
    /// Zero when the segment does not exist.
    pub async fn membership_count_for_segment(&self, name: &str) -> usize {
        let tables = self.tables.read().await;
        match tables.segments.get(name) {
            Some(id) => tables.memberships.iter().filter(|(_, s)| s == id).count(),
            None => 0,
        }
    }

    /// Total number of membership rows.
    pub async fn membership_count(&self) -> usize {
        self.tables.read().await.memberships.len()
    }

    async fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.read().await.contains(operation) {
            return Err(SegmenterError::Internal(anyhow::anyhow!(
                "injected failure in {operation}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SegmentStore for InMemorySegmentStore {
    async fn create_segment(&self, name: &str) -> Result<()> {
        self.check("create_segment").await?;
        let mut tables = self.tables.write().await;
        if tables.segments.contains_key(name) {
            return Err(SegmenterError::AlreadyExists(format!("segment '{name}'")));
        }
        tables.next_segment_id += 1;
        let id = tables.next_segment_id;
        tables.segments.insert(name.to_string(), id);
        Ok(())
    }

    async fn delete_segment(&self, name: &str) -> Result<()> {
        self.check("delete_segment").await?;
        let mut tables = self.tables.write().await;
        let id = tables
            .segments
            .remove(name)
            .ok_or_else(|| SegmenterError::NotFound(format!("segment '{name}'")))?;
        tables.memberships.retain(|(_, s)| *s != id);
        Ok(())
    }

    async fn create_user(&self, id: UserId) -> Result<()> {
        self.check("create_user").await?;
        let mut tables = self.tables.write().await;
        if !tables.users.insert(id) {
            return Err(SegmenterError::AlreadyExists(format!("user {id}")));
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.check("delete_user").await?;
        let mut tables = self.tables.write().await;
        if !tables.users.remove(&id) {
            return Err(SegmenterError::NotFound(format!("user {id}")));
        }
        tables.memberships.retain(|(u, _)| *u != id);
        Ok(())
    }

    async fn is_user_created(&self, id: UserId) -> Result<bool> {
        self.check("is_user_created").await?;
        Ok(self.tables.read().await.users.contains(&id))
    }

    async fn add_user_to_segment(&self, user_id: UserId, segment: &str) -> Result<()> {
        self.check("add_user_to_segment").await?;
        let mut tables = self.tables.write().await;
        let segment_id = tables.segment_id(segment)?;
        if !tables.users.contains(&user_id) {
            // Foreign key violation in the relational store.
            return Err(SegmenterError::Internal(anyhow::anyhow!(
                "user {user_id} is not present in users"
            )));
        }
        if !tables.memberships.insert((user_id, segment_id)) {
            return Err(SegmenterError::AlreadyExists(format!(
                "user {user_id} in segment '{segment}'"
            )));
        }
        Ok(())
    }

    async fn delete_user_from_segment(&self, user_id: UserId, segment: &str) -> Result<()> {
        self.check("delete_user_from_segment").await?;
        let mut tables = self.tables.write().await;
        let segment_id = tables.segment_id(segment)?;
        if !tables.memberships.remove(&(user_id, segment_id)) {
            return Err(SegmenterError::NotFound(format!(
                "user {user_id} in segment '{segment}'"
            )));
        }
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        self.check("get_user").await?;
        let tables = self.tables.read().await;
        if !tables.users.contains(&id) {
            return Err(SegmenterError::NotFound(format!("user {id}")));
        }
        let member_of: HashSet<SegmentId> = tables
            .memberships
            .iter()
            .filter(|(u, _)| *u == id)
            .map(|(_, s)| *s)
            .collect();
        let mut segments: Vec<String> = tables
            .segments
            .iter()
            .filter(|(_, sid)| member_of.contains(sid))
            .map(|(name, _)| name.clone())
            .collect();
        segments.sort();
        Ok(User { id, segments })
    }
}
