//! Test fixtures for sources, responses and silo activities.

#![allow(dead_code)]

use bridge_core::common::{ResponseKey, SourceKey};
use bridge_core::domains::responses::{Response, ResponseKind, ResponseStatus};
use bridge_core::domains::sources::{Activity, Source};
use bridge_core::kernel::test_dependencies::MockSilo;
use serde_json::json;
use uuid::Uuid;

/// A key no other test uses, for the shared Postgres database.
pub fn unique_key(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// An enabled, listening, never-polled source read by the mock silo
pub fn test_source(key: &str) -> Source {
    Source::builder()
        .key(key)
        .silo(MockSilo::SHORT_NAME)
        .name("Test Source")
        .feed_url("http://fa.ke/feed")
        .domain_urls(vec!["http://my.blog/".to_string()])
        .build()
}

/// A new comment response on `source_key` with the given unsent targets
pub fn test_response(key: &str, source_key: &str, unsent: &[&str]) -> Response {
    Response::builder()
        .key(key)
        .source_key(source_key)
        .activity_id("tag:fa.ke,2013:a1")
        .kind(ResponseKind::Comment)
        .unsent(unsent.iter().copied().collect())
        .response_json(json!({"id": key, "objectType": "comment", "content": "nice"}))
        .build()
}

/// A response already holding targets in each set
pub fn response_with_sets(
    key: &str,
    source_key: &str,
    unsent: &[&str],
    sent: &[&str],
    error: &[&str],
) -> Response {
    let mut response = test_response(key, source_key, unsent);
    response.sent = sent.iter().copied().collect();
    response.error = error.iter().copied().collect();
    if !error.is_empty() {
        response.status = ResponseStatus::Error;
    }
    response
}

/// A post activity whose content links to `content` and that carries one
/// comment reply with id `reply_id`
pub fn activity_with_reply(activity_id: &str, content: &str, reply_id: &str) -> Activity {
    serde_json::from_value(json!({
        "id": activity_id,
        "verb": "post",
        "url": "http://fa.ke/post/1",
        "object": {
            "id": activity_id,
            "objectType": "note",
            "content": content,
            "replies": {"totalItems": 1, "items": [
                {"id": reply_id, "objectType": "comment", "content": "reply"}
            ]}
        }
    }))
    .expect("fixture activity is valid")
}

/// A post activity with a like and a share tag and no replies
pub fn activity_with_like_and_share(activity_id: &str, content: &str) -> Activity {
    serde_json::from_value(json!({
        "id": activity_id,
        "verb": "post",
        "object": {
            "id": activity_id,
            "objectType": "note",
            "content": content,
            "tags": [
                {"objectType": "activity", "verb": "like", "id": format!("{}_liked_by_1", activity_id)},
                {"objectType": "activity", "verb": "share", "id": format!("{}_shared_by_2", activity_id)}
            ]
        }
    }))
    .expect("fixture activity is valid")
}

pub fn source_key(key: &str) -> SourceKey {
    SourceKey::new(key)
}

pub fn response_key(key: &str) -> ResponseKey {
    ResponseKey::new(key)
}
