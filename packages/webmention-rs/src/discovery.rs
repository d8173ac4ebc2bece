//! Webmention endpoint discovery.
//!
//! Checks the HTTP `Link` header first, then `<link>` and `<a>` elements
//! carrying `rel="webmention"` in document order.

use scraper::{Html, Selector};
use url::Url;

const REL_WEBMENTION: &str = "webmention";
const LEGACY_REL: &str = "http://webmention.org/";

/// Find the endpoint in one or more `Link` header values.
pub fn endpoint_from_link_header<'a>(
    base: &Url,
    headers: impl IntoIterator<Item = &'a str>,
) -> Option<Url> {
    for header in headers {
        for link in header.split(',') {
            let mut parts = link.split(';');
            let Some(target) = parts.next() else {
                continue;
            };
            let target = target.trim();
            if !(target.starts_with('<') && target.ends_with('>')) {
                continue;
            }
            let href = &target[1..target.len() - 1];

            let is_webmention = parts.any(|param| {
                let Some((name, value)) = param.split_once('=') else {
                    return false;
                };
                name.trim().eq_ignore_ascii_case("rel")
                    && value
                        .trim()
                        .trim_matches('"')
                        .split_whitespace()
                        .any(is_webmention_rel)
            });

            if is_webmention {
                if let Ok(url) = base.join(href) {
                    return Some(url);
                }
            }
        }
    }
    None
}

/// Find the endpoint in an HTML document.
pub fn endpoint_from_html(base: &Url, html: &str) -> Option<Url> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("link[rel][href], a[rel][href]").ok()?;

    document
        .select(&selector)
        .filter(|element| {
            element
                .value()
                .attr("rel")
                .map(|rel| rel.split_whitespace().any(is_webmention_rel))
                .unwrap_or(false)
        })
        .find_map(|element| {
            let href = element.value().attr("href")?;
            base.join(href.trim()).ok()
        })
}

fn is_webmention_rel(rel: &str) -> bool {
    rel.eq_ignore_ascii_case(REL_WEBMENTION) || rel == LEGACY_REL
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.zz/post/1").unwrap()
    }

    #[test]
    fn link_header_relative_endpoint() {
        let found = endpoint_from_link_header(
            &base(),
            ["<https://other/x>; rel=\"me\", </wm>; rel=\"webmention\""],
        );
        assert_eq!(found.unwrap().as_str(), "http://example.zz/wm");
    }

    #[test]
    fn link_header_multiple_rels() {
        let found = endpoint_from_link_header(&base(), ["<http://wm.zz/>; rel=\"webmention pingback\""]);
        assert_eq!(found.unwrap().as_str(), "http://wm.zz/");
    }

    #[test]
    fn html_link_before_anchor() {
        let html = r#"<html><head><link rel="stylesheet" href="/s.css">
            <link rel="webmention" href="/endpoint"></head>
            <body><a rel="webmention" href="/other">x</a></body></html>"#;
        let found = endpoint_from_html(&base(), html);
        assert_eq!(found.unwrap().as_str(), "http://example.zz/endpoint");
    }

    #[test]
    fn empty_href_means_the_page_itself() {
        let html = r#"<link rel="webmention" href="">"#;
        let found = endpoint_from_html(&base(), html);
        assert_eq!(found.unwrap().as_str(), "http://example.zz/post/1");
    }

    #[test]
    fn no_endpoint() {
        assert!(endpoint_from_html(&base(), "<p>nothing here</p>").is_none());
        assert!(endpoint_from_link_header(&base(), ["<http://x/>; rel=\"me\""]).is_none());
    }
}
