//! segmenter_server — REST server for users, segments and memberships.
//!
//! Reads its YAML config from the file named by `CONFIG_PATH` (a `.env`
//! file in the working directory is loaded first). Log filtering follows
//! `RUST_LOG`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use segmenter_core::memory::InMemorySegmentStore;
use segmenter_core::ports::SegmentStore;
use segmenter_core::service::{SegmentService, SegmentServiceImpl};
use segmenter_postgres::{connect_with_deadline, ensure_schema, PgSegmentStore};
use segmenter_server::config::{Config, StorageBackend};
use segmenter_server::router::build_router;
use sqlx::PgPool;
use tokio::net::TcpListener;

/// Interval between startup connection attempts.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,segmenter_server=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(
        endpoint = %config.server.endpoint,
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    // Build the store once and inject it; the pool is kept for shutdown.
    let (store, pool): (Arc<dyn SegmentStore>, Option<PgPool>) = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = connect_with_deadline(
                config.storage.connect_options(),
                config.storage.max_connections,
                config.storage.timeout(),
                CONNECT_RETRY_INTERVAL,
            )
            .await
            .context("failed to connect to database")?;
            ensure_schema(&pool)
                .await
                .context("failed to create tables")?;
            let store: Arc<dyn SegmentStore> = Arc::new(PgSegmentStore::new(pool.clone()));
            (store, Some(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            let store: Arc<dyn SegmentStore> = Arc::new(InMemorySegmentStore::new());
            (store, None)
        }
    };

    let service: Arc<dyn SegmentService> = Arc::new(SegmentServiceImpl::new(store));
    let app = build_router(service);

    let listener = TcpListener::bind(&config.server.endpoint)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.endpoint))?;
    tracing::info!("segmenter_server listening on {}", config.server.endpoint);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("segmenter_server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
