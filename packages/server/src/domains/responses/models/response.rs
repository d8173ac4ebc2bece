use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::common::{strip_tag_uri, ResponseKey, SourceKey, TargetSet};

/// Response - one comment, like, repost or post and the targets it must reach
///
/// Every discovered target lives in exactly one of `unsent`, `sent` and
/// `error`. Poll fills `unsent` once at creation; propagate moves targets
/// between the sets and drops the ones that can never succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct Response {
    #[builder(setter(into))]
    pub key: ResponseKey,
    #[builder(setter(into))]
    pub source_key: SourceKey,
    /// Id of the activity this response belongs to
    #[builder(setter(into))]
    pub activity_id: String,
    pub kind: ResponseKind,
    #[builder(default = ResponseStatus::New)]
    pub status: ResponseStatus,
    #[builder(default)]
    pub unsent: TargetSet,
    #[builder(default)]
    pub sent: TargetSet,
    #[builder(default)]
    pub error: TargetSet,
    #[builder(default, setter(strip_option))]
    pub leased_until: Option<DateTime<Utc>>,
    #[builder(default = Value::Null)]
    pub activity_json: Value,
    #[builder(default = Value::Null)]
    pub response_json: Value,
    /// Compare-and-set token, bumped by the store on every write
    #[builder(default = 0)]
    pub version: i64,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Response {
    /// Whether another delivery owns this record at `now`.
    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        self.status == ResponseStatus::Processing
            && self.leased_until.is_some_and(|until| until > now)
    }

    pub fn is_complete(&self) -> bool {
        self.status == ResponseStatus::Complete
    }

    /// Whether a propagate delivery is still owed: never attempted, left in
    /// `error`, or abandoned by a delivery whose lease ran out.
    pub fn needs_delivery(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            ResponseStatus::New | ResponseStatus::Error => true,
            ResponseStatus::Processing => !self.is_leased(now),
            ResponseStatus::Complete => false,
        }
    }

    /// Targets to attempt on this delivery: `unsent` then `error`.
    pub fn candidates(&self) -> Vec<String> {
        self.unsent.iter().chain(self.error.iter()).map(str::to_string).collect()
    }

    pub fn mark_sent(&mut self, target: &str) {
        self.unsent.remove(target);
        self.error.remove(target);
        self.sent.insert(target.to_string());
    }

    pub fn mark_error(&mut self, target: &str) {
        self.unsent.remove(target);
        if !self.sent.contains(target) {
            self.error.insert(target.to_string());
        }
    }

    /// Drop a target that can never succeed.
    pub fn give_up(&mut self, target: &str) {
        self.unsent.remove(target);
        self.error.remove(target);
    }

    /// No target appears in more than one set.
    pub fn is_partitioned(&self) -> bool {
        self.unsent.is_disjoint(&self.sent)
            && self.unsent.is_disjoint(&self.error)
            && self.sent.is_disjoint(&self.error)
    }

    /// The URL a receiver fetches to read this response.
    ///
    /// `{base}/{kind}/{silo}/{source}/{activity}/{response}`, with tag URI
    /// prefixes stripped from every id.
    pub fn webmention_source_url(&self, base_url: &str, silo: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.kind,
            silo,
            self.source_key.short_id(),
            strip_tag_uri(&self.activity_id),
            self.key.short_id(),
        )
    }
}

/// Response status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    New,
    Processing,
    Complete,
    Error,
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseStatus::New => write!(f, "new"),
            ResponseStatus::Processing => write!(f, "processing"),
            ResponseStatus::Complete => write!(f, "complete"),
            ResponseStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ResponseStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(ResponseStatus::New),
            "processing" => Ok(ResponseStatus::Processing),
            "complete" => Ok(ResponseStatus::Complete),
            "error" => Ok(ResponseStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid response status: {}", s)),
        }
    }
}

/// What kind of interaction a response is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Comment,
    Like,
    Repost,
    Post,
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseKind::Comment => write!(f, "comment"),
            ResponseKind::Like => write!(f, "like"),
            ResponseKind::Repost => write!(f, "repost"),
            ResponseKind::Post => write!(f, "post"),
        }
    }
}

impl std::str::FromStr for ResponseKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "comment" => Ok(ResponseKind::Comment),
            "like" => Ok(ResponseKind::Like),
            "repost" => Ok(ResponseKind::Repost),
            "post" => Ok(ResponseKind::Post),
            _ => Err(anyhow::anyhow!("Invalid response kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn response() -> Response {
        Response::builder()
            .key("tag:fa.ke,2013:c1")
            .source_key("tag:fa.ke,2013:alice")
            .activity_id("tag:fa.ke,2013:a1")
            .kind(ResponseKind::Comment)
            .unsent(TargetSet::from(vec!["http://x/".to_string(), "http://y/".to_string()]))
            .build()
    }

    #[test]
    fn test_lease_needs_processing_and_future_expiry() {
        let now = Utc::now();
        let mut response = response();
        response.leased_until = Some(now + Duration::minutes(1));
        assert!(!response.is_leased(now), "new records are never leased");

        response.status = ResponseStatus::Processing;
        assert!(response.is_leased(now));
        assert!(!response.is_leased(now + Duration::minutes(2)));

        response.leased_until = None;
        assert!(!response.is_leased(now));
    }

    #[test]
    fn test_needs_delivery_until_complete() {
        let now = Utc::now();
        let mut response = response();
        assert!(response.needs_delivery(now));

        response.status = ResponseStatus::Error;
        assert!(response.needs_delivery(now));

        response.status = ResponseStatus::Processing;
        response.leased_until = Some(now + Duration::minutes(1));
        assert!(!response.needs_delivery(now));
        assert!(response.needs_delivery(now + Duration::minutes(2)));

        response.status = ResponseStatus::Complete;
        response.leased_until = None;
        assert!(!response.needs_delivery(now));
    }

    #[test]
    fn test_target_moves_keep_the_partition() {
        let mut response = response();
        response.error.insert("http://z/".to_string());
        assert_eq!(response.candidates(), vec!["http://x/", "http://y/", "http://z/"]);

        response.mark_sent("http://x/");
        response.mark_error("http://y/");
        response.give_up("http://z/");

        assert!(response.is_partitioned());
        assert!(response.unsent.is_empty());
        assert_eq!(response.sent.to_vec(), vec!["http://x/"]);
        assert_eq!(response.error.to_vec(), vec!["http://y/"]);
    }

    #[test]
    fn test_webmention_source_url() {
        let response = response();
        assert_eq!(
            response.webmention_source_url("https://bridge.example/", "activitystreams"),
            "https://bridge.example/comment/activitystreams/alice/a1/c1"
        );
    }

    #[test]
    fn test_status_and_kind_parse() {
        assert_eq!("processing".parse::<ResponseStatus>().unwrap(), ResponseStatus::Processing);
        assert_eq!("repost".parse::<ResponseKind>().unwrap(), ResponseKind::Repost);
        assert!("rsvp".parse::<ResponseKind>().is_err());
    }
}
