//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use webmention::{WebmentionClient, WebmentionOptions};

use crate::config::Config;
use crate::domains::sources::{ActivityStreamsSilo, SiloRegistry};
use crate::kernel::jobs::{PostgresTaskQueue, TaskRunner};
use crate::kernel::{MemoryCache, ServerDeps, SystemClock, WebmentionAdapter};
use crate::storage::PostgresStore;
use crate::server::routes::{health_handler, poll_task_handler, propagate_task_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Absent when the app runs without a database (in-memory tests)
    pub db_pool: Option<PgPool>,
    pub runner: TaskRunner,
}

impl AppState {
    pub fn new(db_pool: Option<PgPool>, server_deps: Arc<ServerDeps>) -> Self {
        Self {
            db_pool,
            runner: TaskRunner::new(server_deps),
        }
    }
}

/// Wire the production collaborators around one Postgres pool.
///
/// Returns the task queue separately so the caller can hand it to a
/// `TaskWorker`.
pub fn build_server_deps(
    config: &Config,
    pool: PgPool,
) -> Result<(ServerDeps, Arc<PostgresTaskQueue>)> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let webmention_client = WebmentionClient::new(WebmentionOptions {
        timeout: config.http_timeout,
        ..Default::default()
    })
    .context("Failed to build webmention client")?;

    let cache = Arc::new(MemoryCache::new(config.cache_max_entries));
    let task_queue = Arc::new(PostgresTaskQueue::new(pool.clone()));
    let silos = build_silo_registry(config, http);

    let deps = ServerDeps::new(
        config,
        Arc::new(PostgresStore::new(pool)),
        task_queue.clone(),
        Arc::new(WebmentionAdapter::new(webmention_client, cache)),
        silos,
        Arc::new(SystemClock),
    );
    Ok((deps, task_queue))
}

/// Register one adapter per supported silo.
pub fn build_silo_registry(config: &Config, http: reqwest::Client) -> SiloRegistry {
    SiloRegistry::new().register(Arc::new(
        ActivityStreamsSilo::new(http, config.activity_fetch_count)
            .with_domains(config.silo_domains.clone()),
    ))
}

/// Build the Axum application router
///
/// The task endpoints use the same `TaskRunner` as the background worker,
/// so a task behaves the same whichever transport delivers it.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/_ah/queue/poll", post(poll_task_handler))
        .route("/_ah/queue/propagate", post(propagate_task_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
