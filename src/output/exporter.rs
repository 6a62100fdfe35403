//! Markdown page export
//!
//! Each crawled internal page can be mirrored to
//! `{markdown_dir}/{host}/{path segments}.md` with YAML-style frontmatter.
//! A `content_sha256` hash in the frontmatter makes the export idempotent:
//! a file whose stored hash matches the freshly rendered text is never
//! rewritten. Pages whose HTML converts to nothing fall back to a document
//! assembled from the title, meta description, any meta-refresh target,
//! and regex-extracted visible text.

use crate::convert::{self, decode_entities};
use crate::crawler::{extract_meta_refresh_target, Crawler};
use crate::report::{ErrorKind, ErrorRecord, LinkKind, PageReport};
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

impl Crawler {
    /// Exports one page as Markdown, recording the outcome on the report
    pub(crate) fn export_markdown(
        &self,
        page: &mut PageReport,
        body: &[u8],
        visited_at: DateTime<Utc>,
    ) {
        let Some(ref markdown_dir) = self.markdown_dir else {
            return;
        };
        let Ok(parsed) = Url::parse(&page.url) else {
            return;
        };

        let markdown = convert::convert(Some(&parsed), body);
        let text = if markdown.is_empty() {
            build_empty_content_fallback(body)
        } else {
            let host = host_key(&parsed);
            let cleaned = self.boilerplate.strip(&host, &markdown);
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                markdown
            } else {
                cleaned.to_string()
            }
        };

        let hash = format!("{:x}", Sha256::digest(text.as_bytes()));

        let Some(target) = markdown_file_path(markdown_dir, &page.url) else {
            return;
        };

        // One writer at a time keeps the read-hash-then-write sequence
        // atomic with respect to other workers.
        let _guard = self.markdown_lock.lock().unwrap();

        if read_markdown_hash(&target).as_deref() == Some(hash.as_str()) {
            page.markdown_skipped_reason = "unchanged content".to_string();
            return;
        }

        if let Some(parent) = target.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                self.reporter.record_error(ErrorRecord {
                    source: page.url.clone(),
                    target: target.display().to_string(),
                    kind: ErrorKind::Markdown,
                    message: err.to_string(),
                    status: 0,
                });
                page.markdown_skipped_reason = err.to_string();
                return;
            }
        }

        let (internal_links, external_links) = count_link_kinds(page);
        let content =
            build_markdown_document(page, &text, visited_at, &hash, internal_links, external_links);
        if let Err(err) = fs::write(&target, content) {
            self.reporter.record_error(ErrorRecord {
                source: page.url.clone(),
                target: target.display().to_string(),
                kind: ErrorKind::Markdown,
                message: err.to_string(),
                status: 0,
            });
            page.markdown_skipped_reason = err.to_string();
            return;
        }

        page.markdown_path = Some(target);
        page.markdown_skipped_reason.clear();
    }
}

/// Host map key including any explicit port
pub(crate) fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or("").to_lowercase();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

fn count_link_kinds(page: &PageReport) -> (usize, usize) {
    let internal = page
        .links
        .iter()
        .filter(|link| link.kind == LinkKind::Internal)
        .count();
    (internal, page.links.len() - internal)
}

/// Assembles the frontmatter and body of one export file
fn build_markdown_document(
    page: &PageReport,
    body: &str,
    visited_at: DateTime<Utc>,
    hash: &str,
    internal_links: usize,
    external_links: usize,
) -> String {
    let mut out = String::with_capacity(body.len() + 256);
    out.push_str("---\n");
    let _ = writeln!(out, "url: {}", page.url);
    let _ = writeln!(out, "status: {}", page.status);
    let _ = writeln!(out, "retrieved_ms: {}", page.retrieved.as_millis());
    let _ = writeln!(
        out,
        "fetched_at: {}",
        visited_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "content_sha256: {hash}");
    let _ = writeln!(out, "word_count: {}", word_count(body));
    let _ = writeln!(out, "internal_links: {internal_links}");
    let _ = writeln!(out, "external_links: {external_links}");
    if !page.error.is_empty() {
        let _ = writeln!(out, "error: {:?}", page.error);
    }
    out.push_str("---\n\n");
    out.push_str(body);
    out.push('\n');
    out
}

fn word_count(body: &str) -> usize {
    body.split_whitespace().count()
}

/// Computes the export file path for a URL under the given directory
///
/// Layout: `{dir}/{host}/{path segment}/.../{last segment}.md`. The empty
/// path maps to `index.md`, empty segments to `section`, and a query
/// string is appended to the basename as `__{query}`. Every component is
/// sanitized to `[A-Za-z0-9._-]`.
pub fn markdown_file_path(dir: &Path, raw_url: &str) -> Option<PathBuf> {
    let parsed = Url::parse(raw_url).ok()?;
    let mut host = sanitize_segment(&host_key(&parsed));
    if host.is_empty() {
        host = "unknown-host".to_string();
    }

    let trimmed_path = parsed.path().trim_matches('/');
    let mut segments: Vec<String> = if trimmed_path.is_empty() {
        vec!["index".to_string()]
    } else {
        trimmed_path
            .split('/')
            .map(|part| {
                let sanitized = sanitize_segment(part);
                if sanitized.is_empty() {
                    "section".to_string()
                } else {
                    sanitized
                }
            })
            .collect()
    };

    let mut base = segments.pop().unwrap_or_else(|| "index".to_string());
    if let Some(query) = parsed.query() {
        if !query.is_empty() {
            base = format!("{base}__{}", sanitize_segment(query));
        }
    }
    base.push_str(".md");

    let mut path = dir.join(host);
    for segment in segments {
        path.push(segment);
    }
    path.push(base);
    Some(path)
}

/// Keeps `[A-Za-z0-9._-]`, replaces everything else with `-`, and strips
/// leading/trailing dashes
fn sanitize_segment(input: &str) -> String {
    let mapped: String = input
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '-',
        })
        .collect();
    mapped.trim_matches('-').to_string()
}

/// Reads the `content_sha256` value from an existing export file
///
/// Line endings are normalized so files rewritten with CRLF still match.
fn read_markdown_hash(path: &Path) -> Option<String> {
    let data = fs::read_to_string(path).ok()?;
    let content = data.replace("\r\n", "\n");
    let remainder = content.strip_prefix("---\n")?;
    let end = remainder.find("\n---")?;
    for line in remainder[..end].lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("content_sha256:") {
            return Some(value.trim().to_string());
        }
    }
    None
}

static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_DESCRIPTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta[^>]+(?:name|property)\s*=\s*['"](?:description|og:description)['"][^>]*content\s*=\s*['"]([^'"]+)['"]"#,
    )
    .unwrap()
});

static FALLBACK_STRIP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap(),
        Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap(),
        Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap(),
        Regex::new(r"(?is)<template[^>]*>.*?</template>").unwrap(),
        Regex::new(r"(?is)<iframe[^>]*>.*?</iframe>").unwrap(),
    ]
});
static COMMENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<br[^>]*>").unwrap());
static LI_OPEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<li[^>]*>").unwrap());
static LI_CLOSE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</li>").unwrap());
static HEADING_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?is)<h1[^>]*>").unwrap(), "\n\n# "),
        (Regex::new(r"(?is)<h2[^>]*>").unwrap(), "\n\n## "),
        (Regex::new(r"(?is)<h3[^>]*>").unwrap(), "\n\n### "),
        (Regex::new(r"(?is)<h4[^>]*>").unwrap(), "\n\n#### "),
        (Regex::new(r"(?is)<h5[^>]*>").unwrap(), "\n\n##### "),
        (Regex::new(r"(?is)<h6[^>]*>").unwrap(), "\n\n###### "),
    ]
});
static HEADING_CLOSE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</h[1-6]>").unwrap());
static BLOCK_OPEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(p|div|section|article|main|header|footer|address|blockquote|table|tr|tbody|thead|tfoot|ul|ol)[^>]*>").unwrap()
});
static BLOCK_CLOSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)</(p|div|section|article|main|header|footer|address|blockquote|table|tr|tbody|thead|tfoot|ul|ol)>").unwrap()
});
static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").unwrap());

/// Builds a fallback document for pages whose HTML converts to nothing
pub fn build_empty_content_fallback(body: &[u8]) -> String {
    let src = String::from_utf8_lossy(body);
    let title = extract_html_title(&src);
    let description = extract_meta_description(&src);
    let redirect = extract_meta_refresh_target(body).unwrap_or_default();

    let mut out = String::new();
    if !title.is_empty() {
        out.push_str("# ");
        out.push_str(&title);
        out.push_str("\n\n");
    }
    if !description.is_empty() {
        out.push_str(&description);
        out.push_str("\n\n");
    }
    if !redirect.is_empty() {
        out.push_str("Meta refresh redirect target: ");
        out.push_str(&redirect);
        out.push_str("\n\n");
    }
    let visible = extract_visible_text(&src);
    if !visible.is_empty() {
        out.push_str(&visible);
        if !visible.ends_with('\n') {
            out.push('\n');
        }
        return out;
    }
    out.push_str("*No textual content extracted.*\n");
    out
}

fn extract_html_title(src: &str) -> String {
    TITLE_PATTERN
        .captures(src)
        .and_then(|captures| captures.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .unwrap_or_default()
}

fn extract_meta_description(src: &str) -> String {
    META_DESCRIPTION_PATTERN
        .captures(src)
        .and_then(|captures| captures.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .unwrap_or_default()
}

/// Extracts visible text by stripping non-content blocks and converting
/// structural tags into Markdown line breaks, headings, and list markers
fn extract_visible_text(src: &str) -> String {
    if src.trim().is_empty() {
        return String::new();
    }
    let mut cleaned = src.to_string();
    for pattern in FALLBACK_STRIP_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, " ").into_owned();
    }
    cleaned = COMMENT_PATTERN.replace_all(&cleaned, " ").into_owned();
    cleaned = BR_PATTERN.replace_all(&cleaned, "\n").into_owned();
    cleaned = LI_OPEN_PATTERN.replace_all(&cleaned, "\n- ").into_owned();
    cleaned = LI_CLOSE_PATTERN.replace_all(&cleaned, "").into_owned();
    for (pattern, prefix) in HEADING_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, *prefix).into_owned();
    }
    cleaned = HEADING_CLOSE_PATTERN
        .replace_all(&cleaned, "\n\n")
        .into_owned();
    cleaned = BLOCK_OPEN_PATTERN.replace_all(&cleaned, "\n\n").into_owned();
    cleaned = BLOCK_CLOSE_PATTERN
        .replace_all(&cleaned, "\n\n")
        .into_owned();
    cleaned = TAG_PATTERN.replace_all(&cleaned, "").into_owned();
    cleaned = decode_entities(&cleaned);

    let mut result: Vec<String> = Vec::new();
    for line in cleaned.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if result.last().is_some_and(|last| !last.is_empty()) {
                result.push(String::new());
            }
            continue;
        }
        let normalized = normalize_line(trimmed);
        if !normalized.is_empty() {
            result.push(normalized);
        }
    }
    let output = result.join("\n").trim().to_string();
    if output.is_empty() {
        output
    } else {
        output + "\n"
    }
}

/// Collapses runs of whitespace inside a line, preserving `- ` list
/// markers and `#` heading prefixes
fn normalize_line(line: &str) -> String {
    if let Some(rest) = line.strip_prefix("- ") {
        let collapsed = collapse_unicode_spaces(rest);
        if collapsed.is_empty() {
            return String::new();
        }
        return format!("- {collapsed}");
    }
    if line.starts_with('#') {
        let sharp_count = line.chars().take_while(|&c| c == '#').count();
        let remainder = line[sharp_count..].trim();
        if remainder.is_empty() {
            return "#".repeat(sharp_count);
        }
        return format!(
            "{} {}",
            "#".repeat(sharp_count),
            collapse_unicode_spaces(remainder)
        );
    }
    collapse_unicode_spaces(line)
}

fn collapse_unicode_spaces(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }
        out.push(c);
        last_was_space = false;
    }
    out.trim().to_string()
}
