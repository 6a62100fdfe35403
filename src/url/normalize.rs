use url::Url;

/// Normalizes a raw href into a canonical absolute URL
///
/// # Normalization Steps
///
/// 1. Trim whitespace; reject empty input
/// 2. Parse, resolving relative references (including scheme-relative ones)
///    against the crawl's start URL
/// 3. Reject schemes other than http and https
/// 4. Lowercase scheme and host (the parser does this), resolve `.`/`..`
///    path segments, and preserve any trailing slash
/// 5. Drop the fragment; keep the query as-is
///
/// # Arguments
///
/// * `start` - The crawl's start URL, used as the base for resolution
/// * `raw` - The raw href value
///
/// # Returns
///
/// * `Some(Url)` - The canonical absolute URL
/// * `None` - The input is empty, unparsable, or uses an unsupported scheme
///
/// # Examples
///
/// ```
/// use url::Url;
/// use linkcheck::url::normalize_url;
///
/// let start = Url::parse("https://example.com/docs/").unwrap();
/// let url = normalize_url(&start, "../a/./b#section").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/a/b");
/// ```
pub fn normalize_url(start: &Url, raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // join() parses absolute references directly and resolves relative ones
    // (path-relative and scheme-relative) against the start URL. It also
    // lowercases scheme and host and removes dot segments.
    let mut resolved = start.join(trimmed).ok()?;

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.host_str()?;

    resolved.set_fragment(None);
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Url {
        Url::parse("https://example.com/docs/index.html").unwrap()
    }

    #[test]
    fn test_relative_path_resolution() {
        let url = normalize_url(&start(), "guide.html").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs/guide.html");
    }

    #[test]
    fn test_root_relative_resolution() {
        let url = normalize_url(&start(), "/about").unwrap();
        assert_eq!(url.as_str(), "https://example.com/about");
    }

    #[test]
    fn test_scheme_relative_uses_start_scheme() {
        let url = normalize_url(&start(), "//other.com/page").unwrap();
        assert_eq!(url.as_str(), "https://other.com/page");
    }

    #[test]
    fn test_absolute_url_passes_through() {
        let url = normalize_url(&start(), "http://other.com/x?q=1").unwrap();
        assert_eq!(url.as_str(), "http://other.com/x?q=1");
    }

    #[test]
    fn test_host_and_scheme_lowercased() {
        let url = normalize_url(&start(), "HTTPS://EXAMPLE.COM/Page").unwrap();
        assert_eq!(url.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_fragment_dropped() {
        let url = normalize_url(&start(), "https://example.com/page#section").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_query_preserved() {
        let url = normalize_url(&start(), "https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page?b=2&a=1");
    }

    #[test]
    fn test_dot_segments_resolved() {
        let url = normalize_url(&start(), "https://example.com/a/../b/./c").unwrap();
        assert_eq!(url.as_str(), "https://example.com/b/c");
    }

    #[test]
    fn test_trailing_slash_preserved() {
        let url = normalize_url(&start(), "https://example.com/section/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/section/");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let url = normalize_url(&start(), "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_whitespace_trimmed() {
        let url = normalize_url(&start(), "  /about  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/about");
    }

    #[test]
    fn test_empty_rejected() {
        assert!(normalize_url(&start(), "").is_none());
        assert!(normalize_url(&start(), "   ").is_none());
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        assert!(normalize_url(&start(), "ftp://example.com/file").is_none());
        assert!(normalize_url(&start(), "javascript:void(0)").is_none());
        assert!(normalize_url(&start(), "mailto:admin@example.com").is_none());
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "../a/./b#frag",
            "/x/y/",
            "//other.com/page?q=1",
            "HTTPS://EXAMPLE.COM/Mixed/Case",
        ] {
            let once = normalize_url(&start(), raw).unwrap();
            let twice = normalize_url(&start(), once.as_str()).unwrap();
            assert_eq!(once, twice, "normalization not idempotent for {raw}");
        }
    }
}
