//! Schema bootstrap and connection setup.

use std::time::Duration;

use anyhow::anyhow;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use segmenter_core::error::SegmenterError;
use segmenter_core::ports::Result;

const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INT PRIMARY KEY
)
"#;

const CREATE_SEGMENT: &str = r#"
CREATE TABLE IF NOT EXISTS segment (
    segment_id   SERIAL PRIMARY KEY,
    segment_name TEXT NOT NULL UNIQUE
)
"#;

const CREATE_USER_SEGMENT: &str = r#"
CREATE TABLE IF NOT EXISTS user_segment (
    user_id    INT NOT NULL REFERENCES users (user_id) ON DELETE CASCADE,
    segment_id INT NOT NULL REFERENCES segment (segment_id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, segment_id)
)
"#;

/// Create `users`, `segment` and `user_segment` if they are missing.
/// Safe to run on every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for (table, ddl) in [
        ("users", CREATE_USERS),
        ("segment", CREATE_SEGMENT),
        ("user_segment", CREATE_USER_SEGMENT),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow!("create table {table}: {e}"))?;
        tracing::info!(table, "table ready");
    }
    Ok(())
}

/// Poll Postgres until a pool connects or `deadline` elapses.
///
/// The first attempt is immediate; later attempts run every
/// `retry_interval`. Failure to connect before the deadline is permanent.
pub async fn connect_with_deadline(
    options: PgConnectOptions,
    max_connections: u32,
    deadline: Duration,
    retry_interval: Duration,
) -> Result<PgPool> {
    let attempts = async {
        let mut ticker = tokio::time::interval(retry_interval);
        let mut attempt: u32 = 0;
        loop {
            ticker.tick().await;
            attempt += 1;
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options.clone())
                .await
            {
                Ok(pool) => return pool,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "postgres not reachable yet, retrying");
                }
            }
        }
    };

    let pool = tokio::time::timeout(deadline, attempts)
        .await
        .map_err(|_| {
            SegmenterError::Internal(anyhow!("timed out waiting for postgres connection"))
        })?;
    tracing::info!("Connected to database");
    Ok(pool)
}
