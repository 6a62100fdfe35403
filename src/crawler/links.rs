//! Link extraction from fetched page bodies
//!
//! Anchors are harvested with a byte regex that tolerates lightly
//! malformed markup and double-quoted, single-quoted, and unquoted href
//! values. A separate scan recognizes `<meta http-equiv="refresh">`
//! client-side redirect targets.

use crate::convert::decode_entities;
use crate::report::{Link, LinkKind};
use crate::url::normalize_url;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use url::Url;

static LINK_PATTERN: Lazy<regex::bytes::Regex> = Lazy::new(|| {
    regex::bytes::Regex::new(r#"(?i)<a[^>]*?\bhref\s*=\s*("([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .unwrap()
});

static META_REFRESH_PATTERN: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r#"(?is)<meta[^>]+http-equiv\s*=\s*['"]refresh['"][^>]*content\s*=\s*['"]([^'"]+)['"]"#)
        .unwrap()
});

/// Classifies a resolved URL as internal or external to the start host
///
/// Internal means the same host (case-insensitive) and port as the start
/// URL.
pub fn classify(start: &Url, candidate: &Url) -> LinkKind {
    let same_host = match (start.host_str(), candidate.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    if same_host && start.port_or_known_default() == candidate.port_or_known_default() {
        LinkKind::Internal
    } else {
        LinkKind::External
    }
}

/// Extracts, normalizes, deduplicates, and classifies the links on a page
///
/// Empty values, bare `#` anchors, and `javascript:`/`mailto:`/`tel:`
/// schemes are rejected. Each href is entity-decoded, resolved against the
/// page URL, normalized against the start URL, and deduplicated within the
/// page.
pub fn extract_links(start: &Url, body: &[u8], base: &str) -> Vec<Link> {
    let matches: Vec<_> = LINK_PATTERN.captures_iter(body).collect();
    if matches.is_empty() {
        return Vec::new();
    }
    let Ok(base_url) = Url::parse(base) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::with_capacity(matches.len());

    for captures in matches {
        let raw = captures
            .get(2)
            .or_else(|| captures.get(3))
            .or_else(|| captures.get(4))
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
            .unwrap_or_default();
        let href = decode_entities(raw.trim());
        let href = href.trim();
        if href.is_empty() || href == "#" {
            continue;
        }
        let lower = href.to_lowercase();
        if lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            continue;
        }

        // Resolve against the page first, then canonicalize.
        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        let Some(normalized) = normalize_url(start, resolved.as_str()) else {
            continue;
        };
        let normalized_str = normalized.to_string();
        if !seen.insert(normalized_str.clone()) {
            continue;
        }

        links.push(Link {
            kind: classify(start, &normalized),
            url: normalized_str,
        });
    }

    links
}

/// Extracts the target of a `<meta http-equiv="refresh">` declaration
///
/// Returns the raw (unnormalized) target URL from the `url=` part of the
/// content attribute, trimmed of surrounding quotes.
pub fn extract_meta_refresh_target(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let src = String::from_utf8_lossy(body);
    let captures = META_REFRESH_PATTERN.captures(&src)?;
    let content = captures.get(1)?.as_str().trim();
    for part in content.split(';') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.len() >= 4 && trimmed[..4].eq_ignore_ascii_case("url=") {
            let target = trimmed[4..].trim().trim_matches(['\'', '"']);
            if target.is_empty() {
                return None;
            }
            return Some(decode_entities(target));
        }
    }
    None
}
