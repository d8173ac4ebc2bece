//! URL helpers shared by target discovery and delivery.

use url::Url;

/// Parse an absolute http(s) URL, normalising it. Anything else is `None`.
pub fn normalize_http_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url.to_string()),
        _ => None,
    }
}

/// The lowercase host of a link, without a leading `www.`.
pub fn domain_from_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Whether `domain` equals `parent` or is a subdomain of it.
pub fn is_same_or_subdomain(domain: &str, parent: &str) -> bool {
    let parent = parent.trim_start_matches('.').to_lowercase();
    domain == parent || domain.ends_with(&format!(".{}", parent))
}
