//! PostgresStore against a real database.

mod common;

use bridge_core::common::time::never_polled;
use bridge_core::domains::polling::{poll_source, PollOutcome};
use bridge_core::domains::propagation::{propagate_response, PropagateOutcome};
use bridge_core::domains::responses::ResponseStatus;
use bridge_core::domains::sources::{Feature, SourceStatus};
use bridge_core::kernel::test_dependencies::MockSilo;
use bridge_core::kernel::{Clock, TestDependencies};
use bridge_core::storage::RecordStore;
use chrono::{Duration, TimeZone, Utc};
use test_context::test_context;

use crate::common::*;

#[test_context(TestHarness)]
#[tokio::test]
async fn source_round_trip(ctx: &TestHarness) {
    let store = ctx.store();
    let key = unique_key("src");
    let mut source = test_source(&key);
    source.features = vec![Feature::Listen, Feature::Webmention];
    source.poll_period_secs = Some(600);

    assert!(store.insert_source(&source).await.unwrap());
    assert!(!store.insert_source(&source).await.unwrap());

    let loaded = store.get_source(&source_key(&key)).await.unwrap().unwrap();
    assert_eq!(loaded.silo, source.silo);
    assert_eq!(loaded.feed_url, source.feed_url);
    assert_eq!(loaded.domain_urls, source.domain_urls);
    assert_eq!(loaded.features, source.features);
    assert_eq!(loaded.status, SourceStatus::Enabled);
    assert_eq!(loaded.last_polled, never_polled());
    assert_eq!(loaded.poll_period_secs, Some(600));

    assert!(store.get_source(&source_key("missing")).await.unwrap().is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn source_update_is_fenced(ctx: &TestHarness) {
    let store = ctx.store();
    let key = unique_key("src");
    let mut source = test_source(&key);
    store.insert_source(&source).await.unwrap();

    let polled_at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    source.mark_polled(polled_at);

    // Wrong fence: nothing is written.
    assert!(!store
        .update_source_if_polled(&source, polled_at)
        .await
        .unwrap());
    assert!(store
        .update_source_if_polled(&source, never_polled())
        .await
        .unwrap());
    // The same write again now holds a stale fence.
    assert!(!store
        .update_source_if_polled(&source, never_polled())
        .await
        .unwrap());

    let loaded = store.get_source(&source_key(&key)).await.unwrap().unwrap();
    assert_eq!(loaded.last_polled, polled_at);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn response_compare_and_set(ctx: &TestHarness) {
    let store = ctx.store();
    let source = unique_key("src");
    let key = unique_key("resp");
    let response = test_response(&key, &source, &["http://a.example/1", "http://b.example/2"]);

    assert!(store.create_response_if_absent(&response).await.unwrap());
    assert!(!store.create_response_if_absent(&response).await.unwrap());

    let mut loaded = store.get_response(&response_key(&key)).await.unwrap().unwrap();
    assert_eq!(loaded.version, 0);
    assert_eq!(
        loaded.unsent.to_vec(),
        vec!["http://a.example/1".to_string(), "http://b.example/2".to_string()]
    );
    assert_eq!(loaded.response_json, response.response_json);

    loaded.mark_sent("http://a.example/1");
    loaded.status = ResponseStatus::Error;
    let mut stale = loaded.clone();

    assert!(store.update_response_if_version(&mut loaded, 0).await.unwrap());
    assert_eq!(loaded.version, 1);
    assert!(!store.update_response_if_version(&mut stale, 0).await.unwrap());
    assert_eq!(stale.version, 0);

    let stored = store.get_response(&response_key(&key)).await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, ResponseStatus::Error);
    assert_eq!(stored.sent.to_vec(), vec!["http://a.example/1".to_string()]);
    assert_eq!(stored.unsent.to_vec(), vec!["http://b.example/2".to_string()]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn list_responses_for_source(ctx: &TestHarness) {
    let store = ctx.store();
    let source = unique_key("src");
    for n in 0..3 {
        let response = test_response(&format!("{}-r{}", source, n), &source, &[]);
        store.create_response_if_absent(&response).await.unwrap();
    }
    store
        .create_response_if_absent(&test_response(&unique_key("other"), "other", &[]))
        .await
        .unwrap();

    let responses = store.list_responses_for_source(&source_key(&source)).await.unwrap();
    assert_eq!(responses.len(), 3);
    assert!(responses.iter().all(|r| r.source_key.as_str() == source));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn poll_then_propagate_on_postgres(ctx: &TestHarness) {
    let source = unique_key("src");
    let activity_id = unique_key("act");
    let reply_id = unique_key("reply");
    let test = TestDependencies::new().mock_silo(MockSilo::new().with_activities(vec![
        activity_with_reply(&activity_id, "see http://my.blog/post", &reply_id),
    ]));
    let store = ctx.store();
    store.insert_source(&test_source(&source)).await.unwrap();
    let deps = test.deps_with_store(store.clone());

    let outcome = poll_source(&source_key(&source), never_polled(), &deps)
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Polled { created: 2, existing: 0 });

    let loaded = store.get_source(&source_key(&source)).await.unwrap().unwrap();
    assert_eq!(loaded.last_polled, test.clock.now());

    for key in test.task_queue.propagates() {
        let outcome = propagate_response(&key, &deps).await.unwrap();
        assert_eq!(outcome, PropagateOutcome::Complete);
    }

    let reply = store.get_response(&response_key(&reply_id)).await.unwrap().unwrap();
    assert_eq!(reply.status, ResponseStatus::Complete);
    assert_eq!(reply.sent.to_vec(), vec!["http://my.blog/post".to_string()]);
    assert_eq!(reply.leased_until, None);
    // Created, leased, committed.
    assert_eq!(reply.version, 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn lease_is_visible_to_other_deliveries(ctx: &TestHarness) {
    let source = unique_key("src");
    let key = unique_key("resp");
    let test = TestDependencies::new();
    let store = ctx.store();
    store.insert_source(&test_source(&source)).await.unwrap();

    let mut response = test_response(&key, &source, &["http://a.example/1"]);
    response.status = ResponseStatus::Processing;
    response.leased_until = Some(test.clock.now() + Duration::minutes(5));
    store.create_response_if_absent(&response).await.unwrap();
    let deps = test.deps_with_store(store.clone());

    let outcome = propagate_response(&response_key(&key), &deps).await.unwrap();
    assert_eq!(outcome, PropagateOutcome::StillLeased);
    assert_eq!(test.webmention.call_count(), 0);

    test.clock.advance(Duration::minutes(10));
    let outcome = propagate_response(&response_key(&key), &deps).await.unwrap();
    assert_eq!(outcome, PropagateOutcome::Complete);
}
