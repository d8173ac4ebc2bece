//! PostgresTaskQueue and TaskWorker against a real database.

mod common;

use std::sync::Arc;

use bridge_core::kernel::jobs::{Task, TaskQueue, TaskRunner, TaskWorker, TaskWorkerConfig};
use bridge_core::common::time::never_polled;
use bridge_core::kernel::test_dependencies::MockSilo;
use bridge_core::kernel::TestDependencies;
use bridge_core::storage::RecordStore;
use sqlx::{PgPool, Row};
use test_context::test_context;
use uuid::Uuid;

use crate::common::*;

async fn task_state(pool: &PgPool, id: Uuid) -> (String, i32, Option<String>) {
    let row = sqlx::query("SELECT status, attempts, last_error FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap();
    (
        row.get("status"),
        row.get("attempts"),
        row.get("last_error"),
    )
}

// One test claims from the shared table, so claims cannot race.
#[test_context(TestHarness)]
#[tokio::test]
async fn worker_acks_retries_and_dead_letters(ctx: &TestHarness) {
    let source = unique_key("src");
    let response = unique_key("resp");
    let store = ctx.store();
    store.insert_source(&test_source(&source)).await.unwrap();
    store
        .create_response_if_absent(&test_response(&response, &source, &["http://a.example/1"]))
        .await
        .unwrap();

    let queue = Arc::new(ctx.task_queue());
    let done = queue
        .insert(&Task::propagate(response_key(&response)), None)
        .await
        .unwrap();
    let missing = queue
        .insert(&Task::propagate(response_key(&unique_key("gone"))), None)
        .await
        .unwrap();
    let bad: Uuid = sqlx::query_scalar(
        "INSERT INTO tasks (id, queue, params, status, run_at, max_attempts) \
         VALUES ($1, 'poll', '{}'::jsonb, 'pending', NOW(), 10) RETURNING id",
    )
    .bind(Uuid::now_v7())
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    let later = queue
        .insert(
            &Task::propagate(response_key(&response)),
            Some(chrono::Utc::now() + chrono::Duration::hours(1)),
        )
        .await
        .unwrap();

    let failing_source = unique_key("src");
    store.insert_source(&test_source(&failing_source)).await.unwrap();
    let poll = ctx
        .task_queue()
        .with_max_attempts(1)
        .insert(&Task::poll(source_key(&failing_source), never_polled()), None)
        .await
        .unwrap();

    let test = TestDependencies::new().mock_silo(MockSilo::new().failing("feed down"));
    let deps = Arc::new(test.deps_with_store(store.clone()));
    let worker = TaskWorker::new(
        queue.clone(),
        TaskRunner::new(deps),
        TaskWorkerConfig::with_worker_id("test-worker"),
    );

    assert_eq!(worker.run_once().await, 4);

    assert_eq!(task_state(&ctx.db_pool, done).await.0, "succeeded");
    let (status, attempts, last_error) = task_state(&ctx.db_pool, missing).await;
    assert_eq!(status, "pending");
    assert_eq!(attempts, 1);
    assert_eq!(last_error.as_deref(), Some("retry later"));
    assert_eq!(task_state(&ctx.db_pool, bad).await.0, "dead_letter");
    assert_eq!(task_state(&ctx.db_pool, later).await.0, "pending");
    // Out of attempts, but a failed poll stays queued.
    let (status, attempts, last_error) = task_state(&ctx.db_pool, poll).await;
    assert_eq!(status, "pending");
    assert_eq!(attempts, 1);
    assert_eq!(last_error.as_deref(), Some("task failed"));

    let stored = store.get_response(&response_key(&response)).await.unwrap().unwrap();
    assert!(stored.is_complete());
    assert_eq!(test.webmention.targets_sent(), vec!["http://a.example/1".to_string()]);

    // The trait entry point lands in the same table.
    queue
        .enqueue(Task::propagate(response_key(&response)), None)
        .await
        .unwrap();
    assert!(queue.pending_count().await.unwrap() >= 3);
}
