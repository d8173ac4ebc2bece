//! Operator CLI for the webmention bridge.
//!
//! Enqueues tasks into the same Postgres task table the server's worker
//! drains, and prints stored records as JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sqlx::PgPool;

use bridge_core::common::{ResponseKey, SourceKey};
use bridge_core::config::Config;
use bridge_core::domains::sources::Source;
use bridge_core::kernel::jobs::{PostgresTaskQueue, Task, TaskQueue};
use bridge_core::storage::{PostgresStore, RecordStore};

#[derive(Parser)]
#[command(name = "bridge_cli")]
#[command(about = "Inspect and drive the webmention bridge")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue an immediate poll with the source's current fence
    Poll { source_key: String },

    /// Enqueue a propagate task for a response
    Propagate { response_key: String },

    /// Print a response as JSON
    Show { response_key: String },

    /// Register a source and schedule its first poll
    AddSource {
        source_key: String,
        #[arg(long, default_value = "activitystreams")]
        silo: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        feed_url: String,
        /// The user's own site, repeatable
        #[arg(long = "domain-url")]
        domain_urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let pool = get_pool().await?;
    let store = PostgresStore::new(pool.clone());
    let queue = PostgresTaskQueue::new(pool);

    match cli.command {
        Commands::Poll { source_key } => cmd_poll(&store, &queue, &source_key).await,
        Commands::Propagate { response_key } => {
            cmd_propagate(&store, &queue, &response_key).await
        }
        Commands::Show { response_key } => cmd_show(&store, &response_key).await,
        Commands::AddSource {
            source_key,
            silo,
            name,
            feed_url,
            domain_urls,
        } => {
            let source = Source::builder()
                .key(source_key.as_str())
                .silo(silo)
                .name(name.unwrap_or_else(|| source_key.clone()))
                .feed_url(feed_url)
                .domain_urls(domain_urls)
                .build();
            cmd_add_source(&store, &queue, source).await
        }
    }
}

async fn get_pool() -> Result<PgPool> {
    let config = Config::from_env()?;
    PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_poll(store: &PostgresStore, queue: &PostgresTaskQueue, key: &str) -> Result<()> {
    let key = SourceKey::new(key);
    let Some(source) = store.get_source(&key).await? else {
        bail!("source {} not found", key);
    };
    let id = queue.insert(&Task::poll(key, source.last_polled), None).await?;
    println!("enqueued poll task {}", id);
    Ok(())
}

async fn cmd_propagate(store: &PostgresStore, queue: &PostgresTaskQueue, key: &str) -> Result<()> {
    let key = ResponseKey::new(key);
    if store.get_response(&key).await?.is_none() {
        bail!("response {} not found", key);
    }
    let id = queue.insert(&Task::propagate(key), None).await?;
    println!("enqueued propagate task {}", id);
    Ok(())
}

async fn cmd_show(store: &PostgresStore, key: &str) -> Result<()> {
    let key = ResponseKey::new(key);
    let Some(response) = store.get_response(&key).await? else {
        bail!("response {} not found", key);
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_add_source(
    store: &PostgresStore,
    queue: &PostgresTaskQueue,
    source: Source,
) -> Result<()> {
    if !store.insert_source(&source).await? {
        bail!("source {} already exists", source.key);
    }
    queue
        .enqueue(Task::poll(source.key.clone(), source.last_polled), None)
        .await?;
    println!("added source {} and scheduled its first poll", source.key);
    Ok(())
}
