//! SegmentService — reconciliation of users, segments and memberships.
//!
//! Takes the storage port via `Arc<dyn SegmentStore>` so the same logic runs
//! against Postgres or the in-memory store. Constructed once at startup in
//! `segmenter_server/src/main.rs` and handed to the router.

use std::collections::{btree_map::Entry, BTreeMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::SegmenterError,
    ports::{Result, SegmentStore},
    types::{
        CreateStatus, MembershipOutcome, SegmentReport, UpdateUserParams, User, UserId,
        UserReport,
    },
};

// ── SegmentService trait ──────────────────────────────────────

/// The service interface the HTTP handlers call.
#[async_trait]
pub trait SegmentService: Send + Sync {
    /// Create each named segment independently. Never fails as a whole.
    async fn create_segments(&self, names: &[String]) -> Result<SegmentReport>;

    /// Create each user independently. Never fails as a whole.
    async fn create_users(&self, ids: &[UserId]) -> Result<UserReport>;

    /// Apply membership additions and removals for one user.
    ///
    /// `NotFound` when the user does not exist. Per-segment `AlreadyExists`
    /// and `NotFound` are skipped; any other store error aborts and is
    /// returned.
    async fn update_user(&self, params: UpdateUserParams) -> Result<()>;

    async fn get_user(&self, id: UserId) -> Result<User>;

    async fn delete_segment(&self, name: &str) -> Result<()>;

    async fn delete_user(&self, id: UserId) -> Result<()>;
}

// ── SegmentServiceImpl ────────────────────────────────────────

pub struct SegmentServiceImpl {
    pub store: Arc<dyn SegmentStore>,
}

impl SegmentServiceImpl {
    pub fn new(store: Arc<dyn SegmentStore>) -> Self {
        Self { store }
    }

    async fn add_membership(&self, user_id: UserId, segment: &str) -> Result<MembershipOutcome> {
        match self.store.add_user_to_segment(user_id, segment).await {
            Ok(()) => Ok(MembershipOutcome::Added),
            Err(SegmenterError::AlreadyExists(_)) => Ok(MembershipOutcome::AlreadyExists),
            Err(SegmenterError::NotFound(_)) => Ok(MembershipOutcome::SegmentMissing),
            Err(e) => Err(e),
        }
    }

    async fn remove_membership(
        &self,
        user_id: UserId,
        segment: &str,
    ) -> Result<MembershipOutcome> {
        match self.store.delete_user_from_segment(user_id, segment).await {
            Ok(()) => Ok(MembershipOutcome::Removed),
            // Segment missing and membership missing are both NotFound at the port.
            Err(SegmenterError::NotFound(_)) => Ok(MembershipOutcome::NotMember),
            Err(SegmenterError::AlreadyExists(_)) => Ok(MembershipOutcome::AlreadyExists),
            Err(e) => Err(e),
        }
    }
}

/// Record `status` for `key` unless an earlier item already claimed it.
fn record<K: Ord>(report: &mut BTreeMap<K, CreateStatus>, key: K, status: CreateStatus) {
    if let Entry::Vacant(slot) = report.entry(key) {
        slot.insert(status);
    }
}

#[async_trait]
impl SegmentService for SegmentServiceImpl {
    async fn create_segments(&self, names: &[String]) -> Result<SegmentReport> {
        let mut report = SegmentReport::new();
        for name in names {
            let status = match self.store.create_segment(name).await {
                Ok(()) => {
                    tracing::info!(segment = %name, "segment created");
                    CreateStatus::Created
                }
                Err(SegmenterError::AlreadyExists(_)) => {
                    tracing::info!(segment = %name, "segment already exists");
                    CreateStatus::AlreadyExist
                }
                Err(e) => {
                    tracing::error!(segment = %name, error = %e, "create segment failed");
                    CreateStatus::NotCreated
                }
            };
            record(&mut report, name.clone(), status);
        }
        Ok(report)
    }

    async fn create_users(&self, ids: &[UserId]) -> Result<UserReport> {
        let mut report = UserReport::new();
        for &id in ids {
            let status = match self.store.create_user(id).await {
                Ok(()) => {
                    tracing::info!(user_id = id, "user created");
                    CreateStatus::Created
                }
                Err(SegmenterError::AlreadyExists(_)) => {
                    tracing::info!(user_id = id, "user already exists");
                    CreateStatus::AlreadyExist
                }
                Err(e) => {
                    tracing::error!(user_id = id, error = %e, "create user failed");
                    CreateStatus::NotCreated
                }
            };
            record(&mut report, id, status);
        }
        Ok(report)
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<()> {
        let user_id = params.id;
        if !self.store.is_user_created(user_id).await? {
            tracing::debug!(user_id, "update rejected: user does not exist");
            return Err(SegmenterError::NotFound(format!("user {user_id}")));
        }

        for segment in &params.add_segments {
            let outcome = self.add_membership(user_id, segment).await.map_err(|e| {
                tracing::error!(user_id, segment = %segment, error = %e, "add to segment failed");
                e
            })?;
            tracing::info!(user_id, segment = %segment, %outcome, "membership add reconciled");
        }

        for segment in &params.delete_segments {
            let outcome = self.remove_membership(user_id, segment).await.map_err(|e| {
                tracing::error!(user_id, segment = %segment, error = %e, "remove from segment failed");
                e
            })?;
            tracing::info!(user_id, segment = %segment, %outcome, "membership removal reconciled");
        }

        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        self.store.get_user(id).await.map_err(|e| {
            tracing::debug!(user_id = id, error = %e, "get user failed");
            e
        })
    }

    async fn delete_segment(&self, name: &str) -> Result<()> {
        self.store.delete_segment(name).await.map_err(|e| {
            tracing::debug!(segment = %name, error = %e, "delete segment failed");
            e
        })
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.store.delete_user(id).await.map_err(|e| {
            tracing::debug!(user_id = id, error = %e, "delete user failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::memory::InMemorySegmentStore;

    /// What a scripted store call should return.
    #[derive(Clone, Copy)]
    enum Reply {
        Ok,
        AlreadyExists,
        NotFound,
        Internal,
    }

    impl Reply {
        fn into_result(self) -> Result<()> {
            match self {
                Reply::Ok => Ok(()),
                Reply::AlreadyExists => Err(SegmenterError::AlreadyExists("scripted".into())),
                Reply::NotFound => Err(SegmenterError::NotFound("scripted".into())),
                Reply::Internal => Err(SegmenterError::Internal(anyhow::anyhow!("tx done"))),
            }
        }
    }

    /// Store double that answers from a script and records every call.
    #[derive(Default)]
    struct ScriptedStore {
        user_exists: Option<Reply>,
        replies: HashMap<(&'static str, String), Reply>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        fn reply(mut self, op: &'static str, key: impl ToString, reply: Reply) -> Self {
            self.replies.insert((op, key.to_string()), reply);
            self
        }

        fn user_exists(mut self, reply: Reply) -> Self {
            self.user_exists = Some(reply);
            self
        }

        fn answer(&self, op: &'static str, key: impl ToString) -> Result<()> {
            let key = key.to_string();
            self.calls.lock().unwrap().push(format!("{op}:{key}"));
            self.replies
                .get(&(op, key))
                .copied()
                .unwrap_or(Reply::Ok)
                .into_result()
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SegmentStore for ScriptedStore {
        async fn create_segment(&self, name: &str) -> Result<()> {
            self.answer("create_segment", name)
        }
        async fn delete_segment(&self, name: &str) -> Result<()> {
            self.answer("delete_segment", name)
        }
        async fn create_user(&self, id: UserId) -> Result<()> {
            self.answer("create_user", id)
        }
        async fn delete_user(&self, id: UserId) -> Result<()> {
            self.answer("delete_user", id)
        }
        async fn is_user_created(&self, id: UserId) -> Result<bool> {
            self.calls.lock().unwrap().push(format!("is_user_created:{id}"));
            match self.user_exists.unwrap_or(Reply::Ok) {
                Reply::Ok => Ok(true),
                Reply::NotFound => Ok(false),
                other => other.into_result().map(|_| false),
            }
        }
        async fn add_user_to_segment(&self, _user_id: UserId, segment: &str) -> Result<()> {
            self.answer("add_user_to_segment", segment)
        }
        async fn delete_user_from_segment(&self, _user_id: UserId, segment: &str) -> Result<()> {
            self.answer("delete_user_from_segment", segment)
        }
        async fn get_user(&self, id: UserId) -> Result<User> {
            self.answer("get_user", id).map(|_| User::new(id))
        }
    }

    fn service(store: ScriptedStore) -> (Arc<ScriptedStore>, SegmentServiceImpl) {
        let store = Arc::new(store);
        let svc = SegmentServiceImpl::new(store.clone());
        (store, svc)
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ── create_segments / create_users ──────────────────────────

    #[tokio::test]
    async fn create_segments_empty_input() {
        let (_, svc) = service(ScriptedStore::default());
        assert!(svc.create_segments(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_segments_maps_each_outcome() {
        let (_, svc) = service(
            ScriptedStore::default()
                .reply("create_segment", "a", Reply::AlreadyExists)
                .reply("create_segment", "b", Reply::Internal),
        );
        let report = svc.create_segments(&names(&["a", "b", "c"])).await.unwrap();
        assert_eq!(report["a"], CreateStatus::AlreadyExist);
        assert_eq!(report["b"], CreateStatus::NotCreated);
        assert_eq!(report["c"], CreateStatus::Created);
    }

    #[tokio::test]
    async fn create_segments_twice_against_real_store() {
        let svc = SegmentServiceImpl::new(Arc::new(InMemorySegmentStore::new()));
        let first = svc.create_segments(&names(&["a", "a"])).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first["a"], CreateStatus::Created);

        let second = svc.create_segments(&names(&["a"])).await.unwrap();
        assert_eq!(second["a"], CreateStatus::AlreadyExist);
    }

    #[tokio::test]
    async fn create_users_first_result_wins() {
        let svc = SegmentServiceImpl::new(Arc::new(InMemorySegmentStore::new()));
        let report = svc.create_users(&[7, 7, 8]).await.unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[&7], CreateStatus::Created);
        assert_eq!(report[&8], CreateStatus::Created);
    }

    #[tokio::test]
    async fn create_users_maps_each_outcome() {
        let (_, svc) = service(
            ScriptedStore::default()
                .reply("create_user", 4, Reply::AlreadyExists)
                .reply("create_user", 5, Reply::Internal)
                .reply("create_user", 6, Reply::AlreadyExists),
        );
        let report = svc.create_users(&[4, 5, 6]).await.unwrap();
        assert_eq!(report[&4], CreateStatus::AlreadyExist);
        assert_eq!(report[&5], CreateStatus::NotCreated);
        assert_eq!(report[&6], CreateStatus::AlreadyExist);
    }

    // ── update_user ─────────────────────────────────────────────

    #[tokio::test]
    async fn update_unknown_user_is_not_found_without_mutations() {
        let (store, svc) = service(ScriptedStore::default().user_exists(Reply::NotFound));
        let err = svc
            .update_user(UpdateUserParams {
                id: 0,
                add_segments: names(&["a"]),
                delete_segments: names(&["b"]),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.calls(), vec!["is_user_created:0".to_string()]);
    }

    #[tokio::test]
    async fn update_propagates_existence_check_error() {
        let (store, svc) = service(ScriptedStore::default().user_exists(Reply::Internal));
        let err = svc
            .update_user(UpdateUserParams {
                id: 1,
                add_segments: names(&["a"]),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 500);
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn update_with_empty_lists_succeeds() {
        let (_, svc) = service(ScriptedStore::default());
        svc.update_user(UpdateUserParams {
            id: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn update_skips_benign_outcomes() {
        let (store, svc) = service(
            ScriptedStore::default()
                .reply("add_user_to_segment", "missing", Reply::NotFound)
                .reply("add_user_to_segment", "dup", Reply::AlreadyExists)
                .reply("delete_user_from_segment", "gone", Reply::NotFound),
        );
        svc.update_user(UpdateUserParams {
            id: 6,
            add_segments: names(&["missing", "dup", "ok"]),
            delete_segments: names(&["gone", "ok2"]),
        })
        .await
        .unwrap();
        assert_eq!(
            store.calls(),
            vec![
                "is_user_created:6",
                "add_user_to_segment:missing",
                "add_user_to_segment:dup",
                "add_user_to_segment:ok",
                "delete_user_from_segment:gone",
                "delete_user_from_segment:ok2",
            ]
        );
    }

    #[tokio::test]
    async fn update_aborts_on_unexpected_add_error() {
        let (store, svc) = service(
            ScriptedStore::default().reply("add_user_to_segment", "a", Reply::Internal),
        );
        let err = svc
            .update_user(UpdateUserParams {
                id: 4,
                add_segments: names(&["a", "b"]),
                delete_segments: names(&["c"]),
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 500);
        assert_eq!(
            store.calls(),
            vec!["is_user_created:4", "add_user_to_segment:a"]
        );
    }

    #[tokio::test]
    async fn update_aborts_on_unexpected_remove_error() {
        let (_, svc) = service(
            ScriptedStore::default()
                .reply("add_user_to_segment", "c", Reply::AlreadyExists)
                .reply("delete_user_from_segment", "d", Reply::Internal),
        );
        let err = svc
            .update_user(UpdateUserParams {
                id: 5,
                add_segments: names(&["c"]),
                delete_segments: names(&["d"]),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SegmenterError::Internal(_)));
    }

    #[tokio::test]
    async fn update_missing_segment_does_not_block_later_items() {
        let store = Arc::new(InMemorySegmentStore::new());
        let svc = SegmentServiceImpl::new(store.clone());
        store.create_user(1).await.unwrap();
        store.create_segment("real").await.unwrap();

        svc.update_user(UpdateUserParams {
            id: 1,
            add_segments: names(&["nope", "real"]),
            delete_segments: vec![],
        })
        .await
        .unwrap();

        assert_eq!(svc.get_user(1).await.unwrap().segments, vec!["real"]);
    }

    #[tokio::test]
    async fn update_adds_then_removes() {
        let store = Arc::new(InMemorySegmentStore::new());
        let svc = SegmentServiceImpl::new(store.clone());
        svc.create_users(&[2]).await.unwrap();
        svc.create_segments(&names(&["a", "b"])).await.unwrap();

        svc.update_user(UpdateUserParams {
            id: 2,
            add_segments: names(&["a", "b"]),
            delete_segments: names(&["a"]),
        })
        .await
        .unwrap();

        assert_eq!(svc.get_user(2).await.unwrap().segments, vec!["b"]);
    }

    // ── passthroughs ────────────────────────────────────────────

    #[tokio::test]
    async fn get_user_propagates_not_found() {
        let (_, svc) = service(ScriptedStore::default().reply("get_user", 0, Reply::NotFound));
        assert!(svc.get_user(0).await.unwrap_err().is_not_found());
        assert_eq!(svc.get_user(1).await.unwrap(), User::new(1));
    }

    #[tokio::test]
    async fn delete_segment_propagates_not_found() {
        let (_, svc) = service(
            ScriptedStore::default().reply("delete_segment", "not exist", Reply::NotFound),
        );
        assert!(svc.delete_segment("not exist").await.unwrap_err().is_not_found());
        svc.delete_segment("success").await.unwrap();
    }

    #[tokio::test]
    async fn delete_user_propagates_not_found() {
        let (_, svc) = service(ScriptedStore::default().reply("delete_user", 0, Reply::NotFound));
        assert!(svc.delete_user(0).await.unwrap_err().is_not_found());
        svc.delete_user(1).await.unwrap();
    }

    #[tokio::test]
    async fn delete_segment_leaves_no_memberships() {
        let store = Arc::new(InMemorySegmentStore::new());
        let svc = SegmentServiceImpl::new(store.clone());
        svc.create_users(&[1, 2]).await.unwrap();
        svc.create_segments(&names(&["x"])).await.unwrap();
        for id in [1, 2] {
            svc.update_user(UpdateUserParams {
                id,
                add_segments: names(&["x"]),
                delete_segments: vec![],
            })
            .await
            .unwrap();
        }
        assert_eq!(store.membership_count_for_segment("x").await, 2);

        svc.delete_segment("x").await.unwrap();
        assert_eq!(store.membership_count().await, 0);
    }
}
