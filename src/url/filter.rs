use std::collections::HashSet;
use url::Url;

/// Builds the allowed-extension set from a configured list
///
/// An empty list yields the default set: extension-less paths plus `.html`
/// and `.htm`. Entries are trimmed and lowercased; a bare `html` becomes
/// `.html`; `/` is kept verbatim. The empty extension is always admitted so
/// directory-style URLs stay crawlable.
pub fn build_allowed_extensions(list: &[String]) -> HashSet<String> {
    let mut allowed = HashSet::new();
    if list.is_empty() {
        allowed.insert(String::new());
        allowed.insert(".html".to_string());
        allowed.insert(".htm".to_string());
        return allowed;
    }
    for item in list {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            allowed.insert(String::new());
            continue;
        }
        let mut lowered = trimmed.to_lowercase();
        if lowered != "/" && !lowered.starts_with('.') {
            lowered.insert(0, '.');
        }
        allowed.insert(lowered);
    }
    allowed.insert(String::new());
    allowed
}

/// Decides whether a URL's path extension admits it to the frontier
///
/// Paths that are empty or end in `/` are admitted when the empty extension
/// (or `/`) is allowed. Otherwise the lowercase extension of the final path
/// segment is looked up in the allowed set.
pub fn allowed_extension(allowed: &HashSet<String>, url: &Url) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let path = url.path();
    if path.is_empty() || path.ends_with('/') {
        return allowed.contains("") || allowed.contains("/");
    }
    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rfind('.') {
        Some(idx) => allowed.contains(&last_segment[idx..].to_lowercase()),
        None => allowed.contains(""),
    }
}
