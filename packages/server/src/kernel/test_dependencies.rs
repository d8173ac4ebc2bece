// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::jobs::{Task, TaskQueue, TaskQueueError};
use super::{Clock, ErrorCode, SendOutcome, ServerDeps, WebmentionSender};
use crate::common::{ResponseKey, SourceKey};
use crate::config::Config;
use crate::domains::responses::Response;
use crate::domains::sources::{Activity, Silo, SiloError, SiloRegistry, Source};
use crate::storage::{MemoryStore, RecordStore, StoreError};

// =============================================================================
// Mock Silo
// =============================================================================

#[derive(Debug, Clone)]
enum SiloBehavior {
    Activities(Vec<Activity>),
    Disable(String),
    Transient(String),
}

pub struct MockSilo {
    short_name: String,
    domains: Vec<String>,
    behavior: Mutex<SiloBehavior>,
    calls: Arc<Mutex<Vec<SourceKey>>>,
}

impl MockSilo {
    pub const SHORT_NAME: &'static str = "fake";

    pub fn new() -> Self {
        Self {
            short_name: Self::SHORT_NAME.to_string(),
            domains: vec!["fa.ke".to_string()],
            behavior: Mutex::new(SiloBehavior::Activities(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_activities(self, activities: Vec<Activity>) -> Self {
        self.set_activities(activities);
        self
    }

    /// Every fetch reports the account as permanently unusable
    pub fn disabling(self, reason: &str) -> Self {
        *self.behavior.lock().unwrap() = SiloBehavior::Disable(reason.to_string());
        self
    }

    /// Every fetch fails with a retryable error
    pub fn failing(self, message: &str) -> Self {
        *self.behavior.lock().unwrap() = SiloBehavior::Transient(message.to_string());
        self
    }

    pub fn set_activities(&self, activities: Vec<Activity>) {
        *self.behavior.lock().unwrap() = SiloBehavior::Activities(activities);
    }

    /// Sources fetched so far
    pub fn calls(&self) -> Vec<SourceKey> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockSilo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Silo for MockSilo {
    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn domains(&self) -> Vec<String> {
        self.domains.clone()
    }

    async fn get_activities(&self, source: &Source) -> Result<Vec<Activity>, SiloError> {
        self.calls.lock().unwrap().push(source.key.clone());
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            SiloBehavior::Activities(activities) => Ok(activities),
            SiloBehavior::Disable(reason) => Err(SiloError::disable(reason)),
            SiloBehavior::Transient(message) => Err(SiloError::transient(message)),
        }
    }
}

// =============================================================================
// Mock Webmention Sender
// =============================================================================

#[derive(Debug, Clone)]
enum SendBehavior {
    Outcome(SendOutcome),
    Raise(String),
}

/// Arguments captured from a send call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCall {
    pub source_url: String,
    pub target_url: String,
}

/// Succeeds for every target unless told otherwise.
pub struct MockWebmentionSender {
    behaviors: Mutex<HashMap<String, SendBehavior>>,
    delay: Option<std::time::Duration>,
    calls: Arc<Mutex<Vec<SendCall>>>,
}

impl MockWebmentionSender {
    pub fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail sends to `target` with a structured error code
    pub fn with_error(self, target: &str, code: ErrorCode) -> Self {
        self.set_error(target, code);
        self
    }

    /// Make sends to `target` raise instead of returning an outcome
    pub fn with_exception(self, target: &str, message: &str) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(target.to_string(), SendBehavior::Raise(message.to_string()));
        self
    }

    /// Hold every send for `delay` before answering
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_error(&self, target: &str, code: ErrorCode) {
        self.behaviors.lock().unwrap().insert(
            target.to_string(),
            SendBehavior::Outcome(SendOutcome::failed(code)),
        );
    }

    /// Let sends to `target` succeed again
    pub fn clear(&self, target: &str) {
        self.behaviors.lock().unwrap().remove(target);
    }

    pub fn calls(&self) -> Vec<SendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn targets_sent(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.target_url).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockWebmentionSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebmentionSender for MockWebmentionSender {
    async fn send(&self, source_url: &str, target_url: &str) -> Result<SendOutcome> {
        self.calls.lock().unwrap().push(SendCall {
            source_url: source_url.to_string(),
            target_url: target_url.to_string(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self.behaviors.lock().unwrap().get(target_url).cloned();
        match behavior {
            None => Ok(SendOutcome::sent("http://endpoint.example/webmention", 202)),
            Some(SendBehavior::Outcome(outcome)) => Ok(outcome),
            Some(SendBehavior::Raise(message)) => Err(anyhow::anyhow!(message)),
        }
    }
}

// =============================================================================
// Fixed Clock
// =============================================================================

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// Spy Task Queue
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedTask {
    pub task: Task,
    pub eta: Option<DateTime<Utc>>,
}

/// Records enqueued tasks instead of running them.
pub struct SpyTaskQueue {
    enqueued: Arc<Mutex<Vec<EnqueuedTask>>>,
    fail: Mutex<bool>,
}

impl SpyTaskQueue {
    pub fn new() -> Self {
        Self {
            enqueued: Arc::new(Mutex::new(Vec::new())),
            fail: Mutex::new(false),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn enqueued(&self) -> Vec<EnqueuedTask> {
        self.enqueued.lock().unwrap().clone()
    }

    /// Enqueued poll tasks as `(source_key, last_polled, eta)`
    pub fn polls(&self) -> Vec<(SourceKey, DateTime<Utc>, Option<DateTime<Utc>>)> {
        self.enqueued()
            .into_iter()
            .filter_map(|e| match e.task {
                Task::Poll {
                    source_key,
                    last_polled,
                } => Some((source_key, last_polled, e.eta)),
                Task::Propagate { .. } => None,
            })
            .collect()
    }

    pub fn propagates(&self) -> Vec<ResponseKey> {
        self.enqueued()
            .into_iter()
            .filter_map(|e| match e.task {
                Task::Propagate { response_key } => Some(response_key),
                Task::Poll { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.enqueued.lock().unwrap().clear();
    }
}

impl Default for SpyTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for SpyTaskQueue {
    async fn enqueue(&self, task: Task, eta: Option<DateTime<Utc>>) -> Result<(), TaskQueueError> {
        if *self.fail.lock().unwrap() {
            return Err(TaskQueueError::Unavailable("spy queue set to fail".into()));
        }
        self.enqueued.lock().unwrap().push(EnqueuedTask { task, eta });
        Ok(())
    }
}

// =============================================================================
// Flaky Store
// =============================================================================

/// A `MemoryStore` whose response compare-and-set fails on chosen calls.
///
/// Calls are numbered from 1 in the order `update_response_if_version`
/// is invoked.
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_updates: Mutex<HashSet<usize>>,
    update_calls: Mutex<usize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing_updates: Mutex::new(HashSet::new()),
            update_calls: Mutex::new(0),
        }
    }

    pub fn fail_response_update(self, call: usize) -> Self {
        self.failing_updates.lock().unwrap().insert(call);
        self
    }

    pub fn update_calls(&self) -> usize {
        *self.update_calls.lock().unwrap()
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get_source(&self, key: &SourceKey) -> Result<Option<Source>, StoreError> {
        self.inner.get_source(key).await
    }

    async fn insert_source(&self, source: &Source) -> Result<bool, StoreError> {
        self.inner.insert_source(source).await
    }

    async fn update_source_if_polled(
        &self,
        source: &Source,
        expected_last_polled: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner
            .update_source_if_polled(source, expected_last_polled)
            .await
    }

    async fn get_response(&self, key: &ResponseKey) -> Result<Option<Response>, StoreError> {
        self.inner.get_response(key).await
    }

    async fn create_response_if_absent(&self, response: &Response) -> Result<bool, StoreError> {
        self.inner.create_response_if_absent(response).await
    }

    async fn update_response_if_version(
        &self,
        response: &mut Response,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let call = {
            let mut calls = self.update_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if self.failing_updates.lock().unwrap().contains(&call) {
            return Err(StoreError::Unavailable(format!(
                "injected failure on update {}",
                call
            )));
        }
        self.inner
            .update_response_if_version(response, expected_version)
            .await
    }

    async fn list_responses_for_source(
        &self,
        key: &SourceKey,
    ) -> Result<Vec<Response>, StoreError> {
        self.inner.list_responses_for_source(key).await
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub struct TestDependencies {
    pub store: Arc<MemoryStore>,
    pub task_queue: Arc<SpyTaskQueue>,
    pub webmention: Arc<MockWebmentionSender>,
    pub silo: Arc<MockSilo>,
    pub clock: Arc<FixedClock>,
    pub config: Config,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            task_queue: Arc::new(SpyTaskQueue::new()),
            webmention: Arc::new(MockWebmentionSender::new()),
            silo: Arc::new(MockSilo::new()),
            clock: Arc::new(FixedClock::default()),
            config: Config {
                base_url: "http://localhost".to_string(),
                ..Config::for_tests()
            },
        }
    }

    /// Set a mock webmention sender
    pub fn mock_webmention(mut self, sender: MockWebmentionSender) -> Self {
        self.webmention = Arc::new(sender);
        self
    }

    /// Set a mock silo
    pub fn mock_silo(mut self, silo: MockSilo) -> Self {
        self.silo = Arc::new(silo);
        self
    }

    pub fn clock_at(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Arc::new(FixedClock::new(now));
        self
    }

    pub fn blocklist(mut self, domains: &[&str]) -> Self {
        self.config.webmention_blocklist = domains.iter().map(|d| d.to_string()).collect();
        self
    }

    /// ServerDeps backed by this harness' memory store
    pub fn deps(&self) -> ServerDeps {
        self.deps_with_store(self.store.clone())
    }

    /// ServerDeps backed by another store (Postgres, flaky wrappers)
    pub fn deps_with_store(&self, store: Arc<dyn RecordStore>) -> ServerDeps {
        ServerDeps::new(
            &self.config,
            store,
            self.task_queue.clone(),
            self.webmention.clone(),
            SiloRegistry::new().register(self.silo.clone()),
            self.clock.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
