//! Per-host boilerplate learning and removal
//!
//! Sites repeat the same navigation header and footer on every page. The
//! detector collects candidate blocks (up to six consecutive non-empty
//! lines at each edge) from the first page of a host and counts how many
//! later pages begin or end with the same block. After three matches the
//! block is confirmed and stripped from every page that carries it; a page
//! that breaks the match replaces the candidate instead of refining it.
//! Single-page hosts are never touched.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

const MAX_HEADER_LINES: usize = 6;
const MAX_FOOTER_LINES: usize = 6;
const CONFIRM_COUNT: u32 = 3;

#[derive(Debug, Default)]
struct HostBoilerplate {
    header_candidate: Vec<String>,
    footer_candidate: Vec<String>,
    header_confirmed: bool,
    footer_confirmed: bool,
    header_matches: u32,
    footer_matches: u32,
}

/// Learns and strips repeated header/footer blocks, per host, per run
#[derive(Debug, Default)]
pub struct BoilerplateDetector {
    hosts: Mutex<HashMap<String, HostBoilerplate>>,
}

impl BoilerplateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one page of Markdown for a host
    ///
    /// Returns the page with any recognized boilerplate removed and blank
    /// edges trimmed; the first page of a host is returned unchanged.
    pub fn strip(&self, host: &str, markdown: &str) -> String {
        let lines: Vec<&str> = if markdown.is_empty() {
            Vec::new()
        } else {
            markdown.split('\n').collect()
        };
        if lines.is_empty() {
            return markdown.to_string();
        }

        let mut hosts = self.hosts.lock().unwrap();
        let info = match hosts.entry(host.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(HostBoilerplate {
                    header_candidate: collect_header_candidate(&lines),
                    footer_candidate: collect_footer_candidate(&lines),
                    ..HostBoilerplate::default()
                });
                return markdown.to_string();
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        let mut updated: &[&str] = &lines;
        if !info.header_candidate.is_empty() {
            if info.header_confirmed {
                updated = remove_header(updated, &info.header_candidate);
            } else if matches_header(&lines, &info.header_candidate) {
                info.header_matches += 1;
                if info.header_matches >= CONFIRM_COUNT {
                    info.header_confirmed = true;
                    updated = remove_header(updated, &info.header_candidate);
                }
            } else {
                info.header_candidate = collect_header_candidate(&lines);
                info.header_matches = 0;
            }
        }
        if !info.footer_candidate.is_empty() {
            if info.footer_confirmed {
                updated = remove_footer(updated, &info.footer_candidate);
            } else if matches_footer(&lines, &info.footer_candidate) {
                info.footer_matches += 1;
                if info.footer_matches >= CONFIRM_COUNT {
                    info.footer_confirmed = true;
                    updated = remove_footer(updated, &info.footer_candidate);
                }
            } else {
                info.footer_candidate = collect_footer_candidate(&lines);
                info.footer_matches = 0;
            }
        }

        trim_empty_edges(updated).join("\n")
    }
}

fn collect_header_candidate(lines: &[&str]) -> Vec<String> {
    let mut candidate = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if candidate.is_empty() {
                continue;
            }
            break;
        }
        candidate.push(trimmed.to_string());
        if candidate.len() >= MAX_HEADER_LINES {
            break;
        }
    }
    candidate
}

fn collect_footer_candidate(lines: &[&str]) -> Vec<String> {
    let mut candidate = Vec::new();
    for line in lines.iter().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if candidate.is_empty() {
                continue;
            }
            break;
        }
        candidate.push(trimmed.to_string());
        if candidate.len() >= MAX_FOOTER_LINES {
            break;
        }
    }
    candidate.reverse();
    candidate
}

fn matches_header(lines: &[&str], header: &[String]) -> bool {
    if header.is_empty() {
        return false;
    }
    let mut idx = 0;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    for expected in header {
        if idx >= lines.len() || lines[idx].trim() != expected {
            return false;
        }
        idx += 1;
    }
    true
}

fn matches_footer(lines: &[&str], footer: &[String]) -> bool {
    if footer.is_empty() {
        return false;
    }
    let mut idx = lines.len();
    while idx > 0 && lines[idx - 1].trim().is_empty() {
        idx -= 1;
    }
    for expected in footer.iter().rev() {
        if idx == 0 || lines[idx - 1].trim() != expected {
            return false;
        }
        idx -= 1;
    }
    true
}

fn remove_header<'a>(lines: &'a [&'a str], header: &[String]) -> &'a [&'a str] {
    if header.is_empty() {
        return lines;
    }
    let mut idx = 0;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    for expected in header {
        if idx >= lines.len() || lines[idx].trim() != expected {
            return lines;
        }
        idx += 1;
    }
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    &lines[idx..]
}

fn remove_footer<'a>(lines: &'a [&'a str], footer: &[String]) -> &'a [&'a str] {
    if footer.is_empty() {
        return lines;
    }
    let mut idx = lines.len();
    while idx > 0 && lines[idx - 1].trim().is_empty() {
        idx -= 1;
    }
    for expected in footer.iter().rev() {
        if idx == 0 || lines[idx - 1].trim() != expected {
            return lines;
        }
        idx -= 1;
    }
    while idx > 0 && lines[idx - 1].trim().is_empty() {
        idx -= 1;
    }
    &lines[..idx]
}

fn trim_empty_edges<'a>(lines: &'a [&'a str]) -> &'a [&'a str] {
    let mut start = 0;
    while start < lines.len() && lines[start].trim().is_empty() {
        start += 1;
    }
    let mut end = lines.len();
    while end > start && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    &lines[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "example.test";

    fn page(body: &str) -> String {
        format!("Site Header\nNavigation\n\n{body}\n\nSite Footer")
    }

    #[test]
    fn test_first_page_untouched() {
        let detector = BoilerplateDetector::new();
        let content = page("Only page content");
        assert_eq!(detector.strip(HOST, &content), content);
    }

    #[test]
    fn test_single_page_host_never_stripped() {
        let detector = BoilerplateDetector::new();
        let content = page("Lone page");
        detector.strip(HOST, &content);
        // No further pages arrive; nothing was removed and nothing is
        // confirmed.
        let other = detector.strip("other.test", &page("Different host"));
        assert!(other.contains("Site Header"));
    }

    #[test]
    fn test_confirmation_after_three_matches() {
        let detector = BoilerplateDetector::new();
        detector.strip(HOST, &page("page 0"));

        // Matches one and two count toward confirmation but do not strip.
        let second = detector.strip(HOST, &page("page 1"));
        assert!(second.contains("Site Header"));
        let third = detector.strip(HOST, &page("page 2"));
        assert!(third.contains("Site Header"));

        // The third match confirms and strips.
        let fourth = detector.strip(HOST, &page("page 3"));
        assert!(!fourth.contains("Site Header"));
        assert!(!fourth.contains("Site Footer"));
        assert!(fourth.contains("page 3"));
    }

    #[test]
    fn test_confirmed_block_keeps_stripping() {
        let detector = BoilerplateDetector::new();
        for i in 0..4 {
            detector.strip(HOST, &page(&format!("page {i}")));
        }
        let stripped = detector.strip(HOST, &page("page 5"));
        assert_eq!(stripped, "page 5");
    }

    #[test]
    fn test_confirmed_block_leaves_unmatched_page_alone() {
        let detector = BoilerplateDetector::new();
        for i in 0..4 {
            detector.strip(HOST, &page(&format!("page {i}")));
        }
        let odd = "Completely different layout\n\nNo shared header";
        assert_eq!(detector.strip(HOST, odd), odd);
    }

    #[test]
    fn test_candidate_replaced_on_mismatch() {
        let detector = BoilerplateDetector::new();
        detector.strip(HOST, &page("page 0"));
        detector.strip(HOST, &page("page 1"));

        // An outlier page resets the count with a fresh candidate.
        detector.strip(HOST, "Other Header\n\nodd page\n\nOther Footer");

        // The old block needs three fresh matches again.
        let after = detector.strip(HOST, &page("page 2"));
        assert!(after.contains("Site Header"));
    }

    #[test]
    fn test_leading_blank_lines_ignored_for_match() {
        let detector = BoilerplateDetector::new();
        detector.strip(HOST, &page("page 0"));
        for i in 1..4 {
            detector.strip(HOST, &format!("\n\n{}", page(&format!("page {i}"))));
        }
        let stripped = detector.strip(HOST, &page("page 4"));
        assert!(!stripped.contains("Site Header"));
    }

    #[test]
    fn test_empty_markdown_passthrough() {
        let detector = BoilerplateDetector::new();
        assert_eq!(detector.strip(HOST, ""), "");
    }

    #[test]
    fn test_hosts_are_independent() {
        let detector = BoilerplateDetector::new();
        for i in 0..4 {
            detector.strip("a.test", &page(&format!("page {i}")));
        }
        // The same layout on a different host is still unconfirmed.
        let other = detector.strip("b.test", &page("first"));
        assert!(other.contains("Site Header"));
    }
}
