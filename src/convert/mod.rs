//! HTML to Markdown conversion
//!
//! A deliberately primitive converter: a linear tokenizer produces text,
//! start-tag, and end-tag events, a stack of node contexts accumulates
//! children, and each node is rendered to Markdown when its end tag pops
//! it. The tokenizer is forgiving of malformed markup; it handles quoted
//! and unquoted attributes, self-closing tags, DOCTYPE, CDATA, comments,
//! and skips `<script>`/`<style>` content wholesale.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::HashMap;
use url::Url;

static SCRIPT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static STYLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static COMMENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Converts an HTML document to Markdown
///
/// Relative `href`/`src` values are resolved against `base` when provided.
/// The result is trimmed; an empty string means no renderable content.
pub fn convert(base: Option<&Url>, body: &[u8]) -> String {
    let cleaned = cleanup_html(body);
    let input = String::from_utf8_lossy(&cleaned);
    let tokens = tokenize(&input);
    if tokens.is_empty() {
        return String::new();
    }

    let mut stack = vec![NodeContext::root()];
    for token in tokens {
        match token {
            Token::Text(text) => {
                let ctx = stack.last_mut().unwrap();
                write_text(ctx, text);
            }
            Token::Start { tag, attrs } => {
                let preserve = stack.last().unwrap().preserve_whitespace || is_preformatted(&tag);
                stack.push(NodeContext::new(tag, attrs, preserve));
            }
            Token::End { .. } => {
                if stack.len() <= 1 {
                    continue;
                }
                let ctx = stack.pop().unwrap();
                let parent = stack.last_mut().unwrap();
                let rendered = render_node(ctx, parent, base);
                parent.content.push_str(&rendered);
            }
        }
    }

    // Unclosed elements still render into their parents.
    while stack.len() > 1 {
        let ctx = stack.pop().unwrap();
        let parent = stack.last_mut().unwrap();
        let rendered = render_node(ctx, parent, base);
        parent.content.push_str(&rendered);
    }

    let output = normalize_markdown(&stack[0].content);
    output.trim().to_string()
}

/// Decodes HTML entities: the common named forms plus numeric references
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match decode_one_entity(tail) {
            Some((decoded, consumed)) => {
                out.push_str(&decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decodes a single entity at the start of `tail` (which begins with `&`)
///
/// Returns the decoded text and the number of bytes consumed, or `None`
/// when no well-formed entity starts here.
fn decode_one_entity(tail: &str) -> Option<(String, usize)> {
    let semi = tail[1..].find(';').map(|i| i + 1)?;
    if semi < 2 || semi > 32 {
        return None;
    }
    let name = &tail[1..semi];
    let decoded = if let Some(numeric) = name.strip_prefix('#') {
        let code = if let Some(hex) = numeric.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            numeric.parse::<u32>().ok()?
        };
        char::from_u32(code)?.to_string()
    } else {
        match name {
            "amp" => "&".to_string(),
            "lt" => "<".to_string(),
            "gt" => ">".to_string(),
            "quot" => "\"".to_string(),
            "apos" => "'".to_string(),
            "nbsp" => "\u{00a0}".to_string(),
            "copy" => "\u{00a9}".to_string(),
            "reg" => "\u{00ae}".to_string(),
            "trade" => "\u{2122}".to_string(),
            "hellip" => "\u{2026}".to_string(),
            "ndash" => "\u{2013}".to_string(),
            "mdash" => "\u{2014}".to_string(),
            "lsquo" => "\u{2018}".to_string(),
            "rsquo" => "\u{2019}".to_string(),
            "ldquo" => "\u{201c}".to_string(),
            "rdquo" => "\u{201d}".to_string(),
            _ => return None,
        }
    };
    Some((decoded, semi + 1))
}

fn cleanup_html(body: &[u8]) -> Vec<u8> {
    if body.is_empty() {
        return Vec::new();
    }
    let cleaned = SCRIPT_PATTERN.replace_all(body, &b""[..]);
    let cleaned = STYLE_PATTERN.replace_all(&cleaned, &b""[..]);
    COMMENT_PATTERN.replace_all(&cleaned, &b""[..]).into_owned()
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Start {
        tag: String,
        attrs: HashMap<String, String>,
    },
    End {
        #[allow(dead_code)]
        tag: String,
    },
}

#[derive(Debug)]
struct NodeContext {
    tag: String,
    attrs: HashMap<String, String>,
    content: String,
    list_index: usize,
    preserve_whitespace: bool,
}

impl NodeContext {
    fn root() -> Self {
        Self::new(String::new(), HashMap::new(), false)
    }

    fn new(tag: String, attrs: HashMap<String, String>, preserve_whitespace: bool) -> Self {
        Self {
            tag,
            attrs,
            content: String::new(),
            list_index: 0,
            preserve_whitespace,
        }
    }
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut text_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        if i > text_start {
            tokens.push(Token::Text(&input[text_start..i]));
        }
        let Some(rel) = input[i + 1..].find('>') else {
            // No closing bracket: the remainder is literal text.
            tokens.push(Token::Text(&input[i..]));
            text_start = input.len();
            break;
        };
        let tag_content = &input[i + 1..i + 1 + rel];
        let mut next = i + 1 + rel + 1;

        let lower = tag_content.trim().to_lowercase();
        if lower.starts_with("!--") {
            // A comment that survived cleanup; skip to its terminator.
            next = match input[next..].find("-->") {
                Some(idx) => next + idx + 3,
                None => input.len(),
            };
            i = next;
            text_start = i;
            continue;
        }
        if lower.starts_with("!doctype") || lower.starts_with("![cdata[") {
            i = next;
            text_start = i;
            continue;
        }

        let closing = lower.starts_with('/');
        let self_closing = lower.ends_with('/');
        let (tag_name, attrs) = parse_tag(tag_content.trim());
        if tag_name.is_empty() {
            i = next;
            text_start = i;
            continue;
        }

        if closing {
            tokens.push(Token::End { tag: tag_name });
        } else if tag_name == "script" || tag_name == "style" {
            let terminator = format!("</{tag_name}>");
            next = match find_ascii_ci(&input[next..], &terminator) {
                Some(idx) => next + idx + terminator.len(),
                None => input.len(),
            };
        } else {
            // Void elements never carry content and are often written
            // without a closing slash.
            let closes_itself = self_closing || is_void(&tag_name);
            tokens.push(Token::Start {
                tag: tag_name.clone(),
                attrs,
            });
            if closes_itself {
                tokens.push(Token::End { tag: tag_name });
            }
        }

        i = next;
        text_start = i;
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

/// Case-insensitive ASCII substring search
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Parses the inside of a tag into its lowercase name and attribute map
fn parse_tag(input: &str) -> (String, HashMap<String, String>) {
    let mut trimmed = input.trim();
    if trimmed.is_empty() {
        return (String::new(), HashMap::new());
    }
    if let Some(stripped) = trimmed.strip_prefix('/') {
        trimmed = stripped.trim();
    }
    if let Some(stripped) = trimmed.strip_suffix('/') {
        trimmed = stripped.trim();
    }
    if trimmed.is_empty() {
        return (String::new(), HashMap::new());
    }

    let name_end = trimmed
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(trimmed.len());
    let name = trimmed[..name_end].to_lowercase();
    let mut attrs = HashMap::new();
    let mut rest = trimmed[name_end..].trim_start();

    while !rest.is_empty() {
        let eq_index = rest.find('=');
        let space_index = rest.find(|c: char| c.is_ascii_whitespace());
        match eq_index {
            None => {
                attrs.insert(rest.trim().to_lowercase(), String::new());
                break;
            }
            Some(eq) if space_index.is_some_and(|sp| sp < eq) => {
                // A bare (valueless) attribute before the next `=`.
                let sp = space_index.unwrap();
                attrs.insert(rest[..sp].trim().to_lowercase(), String::new());
                rest = rest[sp..].trim_start();
                continue;
            }
            Some(eq) => {
                let attr_name = rest[..eq].trim().to_lowercase();
                rest = rest[eq + 1..].trim_start();
                if rest.is_empty() {
                    attrs.insert(attr_name, String::new());
                    break;
                }
                let first = rest.as_bytes()[0];
                let value;
                if first == b'\'' || first == b'"' {
                    let quote = first as char;
                    rest = &rest[1..];
                    match rest.find(quote) {
                        Some(closing) => {
                            value = &rest[..closing];
                            rest = &rest[closing + 1..];
                        }
                        None => {
                            value = rest;
                            rest = "";
                        }
                    }
                } else {
                    match rest.find(|c: char| c.is_ascii_whitespace()) {
                        Some(sp) => {
                            value = &rest[..sp];
                            rest = &rest[sp + 1..];
                        }
                        None => {
                            value = rest;
                            rest = "";
                        }
                    }
                }
                attrs.insert(attr_name, decode_entities(value.trim()));
                rest = rest.trim_start();
            }
        }
    }

    (name, attrs)
}

fn is_preformatted(tag: &str) -> bool {
    matches!(tag, "pre" | "code" | "textarea")
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn write_text(ctx: &mut NodeContext, text: &str) {
    if text.is_empty() {
        return;
    }
    let data = decode_entities(text);
    if ctx.preserve_whitespace {
        ctx.content.push_str(&data);
        return;
    }

    let leading = data.starts_with(is_html_space);
    let trailing = data.ends_with(is_html_space);
    let collapsed = collapse_spaces(&data);
    let collapsed = collapsed.trim();
    if leading && !ctx.content.is_empty() {
        ctx.content.push(' ');
    }
    if !collapsed.is_empty() {
        ctx.content.push_str(collapsed);
        if trailing {
            ctx.content.push(' ');
        }
    } else if trailing && !ctx.content.is_empty() {
        ctx.content.push(' ');
    }
}

fn is_html_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn collapse_spaces(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut has_space = false;
    for mut c in input.chars() {
        if matches!(c, '\n' | '\t' | '\r') {
            c = ' ';
        }
        if c == ' ' {
            if out.is_empty() || has_space {
                continue;
            }
            has_space = true;
            out.push(c);
            continue;
        }
        has_space = false;
        out.push(c);
    }
    out
}

fn render_node(ctx: NodeContext, parent: &mut NodeContext, base: Option<&Url>) -> String {
    let tag = ctx.tag.as_str();
    let inner = ctx.content.as_str();
    match tag {
        "style" | "script" | "head" => String::new(),
        "br" => "\n".to_string(),
        "hr" => "\n\n---\n\n".to_string(),
        "strong" | "b" => {
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("**{trimmed}**")
            }
        }
        "em" | "i" => {
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("_{trimmed}_")
            }
        }
        "code" => {
            if parent.tag == "pre" {
                return inner.to_string();
            }
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("`{trimmed}`")
            }
        }
        "pre" => {
            let content = inner.trim_matches('\n');
            if content.is_empty() {
                String::new()
            } else {
                format!("\n\n```\n{content}\n```\n\n")
            }
        }
        "p" | "div" | "section" | "article" | "main" => {
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("\n\n{trimmed}\n\n")
            }
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                return String::new();
            }
            let level = (tag.as_bytes()[1] - b'0').clamp(1, 6) as usize;
            format!("\n\n{} {trimmed}\n\n", "#".repeat(level))
        }
        "ul" | "ol" => {
            let content = inner.trim_matches('\n');
            if content.is_empty() {
                String::new()
            } else {
                format!("\n{content}\n")
            }
        }
        "li" => {
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                return String::new();
            }
            let marker = if parent.tag == "ol" {
                parent.list_index += 1;
                format!("{}.", parent.list_index)
            } else {
                "-".to_string()
            };
            let mut lines = trimmed.lines();
            let mut out = String::new();
            out.push_str(&marker);
            out.push(' ');
            out.push_str(lines.next().unwrap_or("").trim());
            out.push('\n');
            for line in lines {
                let stripped = line.trim();
                if stripped.is_empty() {
                    out.push('\n');
                    continue;
                }
                out.push_str("  ");
                out.push_str(stripped);
                out.push('\n');
            }
            out
        }
        "blockquote" => {
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                return String::new();
            }
            let quoted: Vec<String> = trimmed
                .lines()
                .map(|line| format!("> {}", line.trim()))
                .collect();
            format!("\n{}\n\n", quoted.join("\n"))
        }
        "a" => {
            let href = ctx.attrs.get("href").map(|v| v.trim()).unwrap_or("");
            let text = inner.trim();
            if text.is_empty() {
                return String::new();
            }
            if href.is_empty() {
                return text.to_string();
            }
            let resolved = resolve_url(base, href);
            format!("[{text}]({resolved})")
        }
        "img" => {
            let src = ctx.attrs.get("src").map(|v| v.trim()).unwrap_or("");
            if src.is_empty() {
                return String::new();
            }
            let alt = ctx.attrs.get("alt").map(|v| v.trim()).unwrap_or("");
            let alt = if alt.is_empty() { "image" } else { alt };
            let resolved = resolve_url(base, src);
            format!("![{alt}]({resolved})")
        }
        "table" | "tbody" | "thead" | "tr" => {
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("\n{trimmed}\n")
            }
        }
        "th" => {
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("**{trimmed}**\t")
            }
        }
        "td" => format!("{}\t", inner.trim()),
        _ => inner.to_string(),
    }
}

fn resolve_url(base: Option<&Url>, raw: &str) -> String {
    let Some(base) = base else {
        return raw.to_string();
    };
    match Url::parse(raw) {
        Ok(absolute) => absolute.to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => base
            .join(raw)
            .map(|resolved| resolved.to_string())
            .unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

/// Trims trailing spaces and collapses runs of blank lines
fn normalize_markdown(content: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut previous_empty = false;
    for line in content.lines() {
        let trimmed = line.trim_end_matches([' ', '\t']);
        if trimmed.trim().is_empty() {
            if !previous_empty {
                result.push("");
            }
            previous_empty = true;
            continue;
        }
        previous_empty = false;
        result.push(trimmed);
    }

    let mut collapsed: Vec<&str> = Vec::with_capacity(result.len());
    let mut blank_count = 0;
    for line in result {
        if line.trim().is_empty() {
            blank_count += 1;
            if blank_count > 2 {
                continue;
            }
        } else {
            blank_count = 0;
        }
        collapsed.push(line);
    }
    collapsed.join("\n")
}
