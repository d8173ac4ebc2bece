//! Original post discovery.
//!
//! Finds the URLs an activity points at: tag and attachment URLs, links in
//! the content, and parenthetical citations like `(example.com path)`.
//! Output keeps first-seen order and holds each URL once.

use lazy_static::lazy_static;
use regex::Regex;

use crate::common::urls::normalize_http_url;
use crate::common::TargetSet;
use crate::domains::sources::AsObject;

lazy_static! {
    static ref LINK_REGEX: Regex = Regex::new(r#"(?i)\bhttps?://[^\s<>"'()\[\]{}]+"#).unwrap();

    // `(domain.tld path)` or `(domain.tld/path)`
    static ref CITATION_REGEX: Regex =
        Regex::new(r"\(([^:\s()/]+\.[^\s()/]{2,})[ /]([^\s()]+)\)").unwrap();
}

/// Object types whose URLs identify people or places, not posts.
const SKIPPED_OBJECT_TYPES: &[&str] = &["person", "group", "hashtag", "place", "activity"];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Candidate webmention targets for one activity object.
pub fn extract_targets(object: &AsObject) -> TargetSet {
    let mut targets = TargetSet::new();
    let mut add = |raw: &str| {
        if let Some(url) = normalize_http_url(raw.trim_end_matches(TRAILING_PUNCTUATION)) {
            targets.insert(url);
        }
    };

    for linked in object.tags.iter().chain(object.attachments.iter()) {
        let skipped = linked
            .object_type
            .as_deref()
            .is_some_and(|t| SKIPPED_OBJECT_TYPES.contains(&t));
        if skipped {
            continue;
        }
        if let Some(url) = &linked.url {
            add(url);
        }
    }

    let content = object.content.as_deref().unwrap_or_default();
    for found in LINK_REGEX.find_iter(content) {
        add(found.as_str());
    }
    for captures in CITATION_REGEX.captures_iter(content) {
        add(&format!("http://{}/{}", &captures[1], &captures[2]));
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(content: &str) -> AsObject {
        AsObject {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    fn link(object_type: &str, url: &str) -> AsObject {
        AsObject {
            object_type: Some(object_type.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_text_citation_and_tag() {
        let mut post = object("foo http://t.get/c bar (t.get d) baz");
        post.tags.push(link("article", "http://t.get/b"));

        assert_eq!(
            extract_targets(&post).to_vec(),
            vec!["http://t.get/b", "http://t.get/c", "http://t.get/d"]
        );
    }

    #[test]
    fn test_skips_people_places_and_activities() {
        let mut post = object("");
        post.tags.push(link("person", "http://people.example/ryan"));
        post.tags.push(link("hashtag", "http://silo.example/tag/x"));
        post.attachments.push(link("place", "http://maps.example/1"));
        post.tags.push(link("activity", "http://silo.example/like/1"));
        post.attachments.push(link("article", "http://blog.example/post"));

        assert_eq!(extract_targets(&post).to_vec(), vec!["http://blog.example/post"]);
    }

    #[test]
    fn test_dedupes_and_trims_punctuation() {
        let post = object(
            "see http://a.example/x. and <a href=\"http://a.example/x\">again</a>, also https://b.example/y!",
        );
        assert_eq!(
            extract_targets(&post).to_vec(),
            vec!["http://a.example/x", "https://b.example/y"]
        );
    }

    #[test]
    fn test_ignores_malformed_and_non_http() {
        let mut post = object("mailto:x@y.z ftp://files.example/a (notadomain) http://");
        post.tags.push(link("article", "not a url"));
        assert!(extract_targets(&post).is_empty());
    }

    #[test]
    fn test_citation_with_slash() {
        let post = object("(ttk.me t4fT2)");
        assert_eq!(extract_targets(&post).to_vec(), vec!["http://ttk.me/t4fT2"]);

        let post = object("(ttk.me/t4fT2)");
        assert_eq!(extract_targets(&post).to_vec(), vec!["http://ttk.me/t4fT2"]);
    }
}
