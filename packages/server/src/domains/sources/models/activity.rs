//! ActivityStreams 1.0 shapes returned by silo adapters.
//!
//! Only the fields the pipeline reads are typed; everything else a silo
//! sends is kept in `extra` so the raw JSON stored on a response is lossless.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domains::responses::models::ResponseKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<AsObject>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    /// Set on tags that are themselves activities (likes, shares)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<AsObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AsObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Collection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default)]
    pub items: Vec<AsObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

/// One sub-object of an activity that becomes a response record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCandidate<'a> {
    pub kind: ResponseKind,
    pub object: &'a AsObject,
}

impl Activity {
    /// Activity id, falling back to its object's id.
    pub fn effective_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or_else(|| self.object.as_ref().and_then(|o| o.id.as_deref()))
            .filter(|id| !id.is_empty())
    }

    /// Replies, likes and shares attached to this activity's object.
    pub fn response_candidates(&self) -> Vec<ResponseCandidate<'_>> {
        let Some(object) = &self.object else {
            return Vec::new();
        };

        let mut candidates: Vec<ResponseCandidate<'_>> = object
            .replies
            .iter()
            .flat_map(|replies| replies.items.iter())
            .map(|reply| ResponseCandidate {
                kind: ResponseKind::Comment,
                object: reply,
            })
            .collect();

        for tag in &object.tags {
            if tag.object_type.as_deref() != Some("activity") {
                continue;
            }
            let kind = match tag.verb.as_deref() {
                Some("like") => ResponseKind::Like,
                Some("share") => ResponseKind::Repost,
                _ => continue,
            };
            candidates.push(ResponseCandidate { kind, object: tag });
        }

        candidates
    }
}
