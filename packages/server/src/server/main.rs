// Main entry point for the bridge server

use std::sync::Arc;

use anyhow::{Context, Result};
use bridge_core::kernel::jobs::{TaskRunner, TaskWorker, TaskWorkerConfig};
use bridge_core::server::{build_app, build_server_deps, AppState};
use bridge_core::Config;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bridge_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting webmention bridge");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(base_url = %config.base_url, "Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let (server_deps, task_queue) = build_server_deps(&config, pool.clone())?;
    let server_deps = Arc::new(server_deps);
    let shutdown = CancellationToken::new();

    // Background worker draining the task table
    let worker_handle = if config.worker_enabled {
        let worker = TaskWorker::new(
            task_queue,
            TaskRunner::new(server_deps.clone()),
            TaskWorkerConfig {
                batch_size: config.worker_batch_size,
                ..Default::default()
            },
        );
        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = worker.run(token).await {
                tracing::error!(error = %e, "Task worker exited with error");
            }
        }))
    } else {
        tracing::info!("Task worker disabled");
        None
    };

    let app = build_app(AppState::new(Some(pool), server_deps));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            token.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(handle) = worker_handle {
        let _ = handle.await;
    }

    Ok(())
}
