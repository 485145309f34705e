//! Postgres implementation of the `SegmentStore` port.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) to avoid a
//! compile-time DB requirement. Uniqueness is enforced by the engine:
//! inserts use `ON CONFLICT DO NOTHING` and an unaffected row means the
//! key was already taken.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use segmenter_core::error::SegmenterError;
use segmenter_core::ports::{Result, SegmentStore};
use segmenter_core::types::{User, UserId};

/// Postgres-backed user/segment store.
#[derive(Clone)]
pub struct PgSegmentStore {
    pool: PgPool,
}

impl PgSegmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolve a segment name to its serial id.
    async fn segment_id(&self, name: &str) -> Result<i32> {
        sqlx::query_scalar::<_, i32>("SELECT segment_id FROM segment WHERE segment_name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?
            .ok_or_else(|| SegmenterError::NotFound(format!("segment '{name}'")))
    }
}

#[async_trait]
impl SegmentStore for PgSegmentStore {
    async fn create_segment(&self, name: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO segment (segment_name)
            VALUES ($1)
            ON CONFLICT (segment_name) DO NOTHING
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        if result.rows_affected() == 0 {
            return Err(SegmenterError::AlreadyExists(format!("segment '{name}'")));
        }
        Ok(())
    }

    async fn delete_segment(&self, name: &str) -> Result<()> {
        // user_segment rows go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM segment WHERE segment_name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;

        if result.rows_affected() == 0 {
            return Err(SegmenterError::NotFound(format!("segment '{name}'")));
        }
        Ok(())
    }

    async fn create_user(&self, id: UserId) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        if result.rows_affected() == 0 {
            return Err(SegmenterError::AlreadyExists(format!("user {id}")));
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;

        if result.rows_affected() == 0 {
            return Err(SegmenterError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn is_user_created(&self, id: UserId) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(exists)
    }

    async fn add_user_to_segment(&self, user_id: UserId, segment: &str) -> Result<()> {
        let segment_id = self.segment_id(segment).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO user_segment (user_id, segment_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, segment_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(segment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        if result.rows_affected() == 0 {
            return Err(SegmenterError::AlreadyExists(format!(
                "user {user_id} in segment '{segment}'"
            )));
        }
        Ok(())
    }

    async fn delete_user_from_segment(&self, user_id: UserId, segment: &str) -> Result<()> {
        let segment_id = self.segment_id(segment).await?;

        let result =
            sqlx::query("DELETE FROM user_segment WHERE user_id = $1 AND segment_id = $2")
                .bind(user_id)
                .bind(segment_id)
                .execute(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;

        if result.rows_affected() == 0 {
            return Err(SegmenterError::NotFound(format!(
                "user {user_id} in segment '{segment}'"
            )));
        }
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        if !self.is_user_created(id).await? {
            return Err(SegmenterError::NotFound(format!("user {id}")));
        }

        let segments = sqlx::query_scalar::<_, String>(
            r#"
            SELECT s.segment_name
            FROM segment s
            JOIN user_segment us ON s.segment_id = us.segment_id
            WHERE us.user_id = $1
            ORDER BY s.segment_name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(User { id, segments })
    }
}
