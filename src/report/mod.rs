//! Crawl reporting: page records, error records, and counters
//!
//! The [`Reporter`] is the thread-safe sink workers write into. Page
//! records merge field-by-field so a later visit never erases information
//! an earlier one recorded; errors are append-only.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Classification of a discovered link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Same host (and port) as the start URL
    Internal,
    /// Any other host
    External,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Internal => write!(f, "internal"),
            LinkKind::External => write!(f, "external"),
        }
    }
}

/// A discovered link with its classification
#[derive(Debug, Clone)]
pub struct Link {
    /// Normalized absolute URL
    pub url: String,
    pub kind: LinkKind,
}

/// Category of a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Request,
    Read,
    Http,
    Rate,
    Markdown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Request => "request",
            ErrorKind::Read => "read",
            ErrorKind::Http => "http",
            ErrorKind::Rate => "rate",
            ErrorKind::Markdown => "markdown",
        };
        write!(f, "{tag}")
    }
}

/// A failure that occurred while visiting or validating a link
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// URL of the page the failure was encountered on
    pub source: String,
    /// URL (or path) the failure relates to
    pub target: String,
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status, when one was observed
    pub status: u16,
}

/// Crawl result for one page
#[derive(Debug, Clone, Default)]
pub struct PageReport {
    pub url: String,
    pub status: u16,
    /// Non-empty when the visit failed or returned status >= 400
    pub error: String,
    pub links: Vec<Link>,
    /// Wall-clock time from job start to body read completion
    pub retrieved: Duration,
    /// Where the Markdown export landed, when one was written
    pub markdown_path: Option<PathBuf>,
    /// Why the Markdown export was skipped, when it was
    pub markdown_skipped_reason: String,
}

impl PageReport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_error(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error: error.into(),
            ..Self::default()
        }
    }
}

/// Crawl-level counters
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub pages_visited: u64,
    pub unique_internal_pages: u64,
    pub unique_external_links: u64,
    pub total_internal_links: u64,
    pub total_external_links: u64,
    pub external_links_checked: u64,
    pub skipped_by_cache: u64,
    pub skipped_by_robots: u64,
    pub skipped_by_extension: u64,
    pub skipped_by_limit: u64,
    pub skipped_by_depth: u64,
    pub duration: Duration,
}

/// The outcome of a crawl
#[derive(Debug)]
pub struct Report {
    pub pages: HashMap<String, PageReport>,
    pub errors: Vec<ErrorRecord>,
    pub stats: Stats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Default)]
struct ReporterState {
    pages: HashMap<String, PageReport>,
    errors: Vec<ErrorRecord>,
}

/// Thread-safe collector of page reports and errors
#[derive(Default)]
pub struct Reporter {
    state: Mutex<ReporterState>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a failure record
    pub fn record_error(&self, error: ErrorRecord) {
        self.state.lock().unwrap().errors.push(error);
    }

    /// Saves a page report, merging into any existing record for the URL
    ///
    /// Merge rules: non-empty `error`, non-empty `links`, non-zero `status`,
    /// and non-zero `retrieved` each overwrite the stored value. A new
    /// `markdown_path` overwrites and clears any stored skip reason; a new
    /// skip reason only lands while no path has been recorded.
    pub fn save_page(&self, page: PageReport) {
        let mut state = self.state.lock().unwrap();
        match state.pages.get_mut(&page.url) {
            Some(existing) => {
                if !page.error.is_empty() {
                    existing.error = page.error;
                }
                if !page.links.is_empty() {
                    existing.links = page.links;
                }
                if page.status != 0 {
                    existing.status = page.status;
                }
                if !page.retrieved.is_zero() {
                    existing.retrieved = page.retrieved;
                }
                if let Some(path) = page.markdown_path {
                    existing.markdown_path = Some(path);
                    existing.markdown_skipped_reason.clear();
                } else if !page.markdown_skipped_reason.is_empty()
                    && existing.markdown_path.is_none()
                {
                    existing.markdown_skipped_reason = page.markdown_skipped_reason;
                }
            }
            None => {
                state.pages.insert(page.url.clone(), page);
            }
        }
    }

    /// Returns a snapshot of a page record, mainly for tests
    pub fn page(&self, url: &str) -> Option<PageReport> {
        self.state.lock().unwrap().pages.get(url).cloned()
    }

    /// Takes the collected pages and errors, leaving the reporter empty
    pub fn take_parts(&self) -> (HashMap<String, PageReport>, Vec<ErrorRecord>) {
        let mut state = self.state.lock().unwrap();
        let state = std::mem::take(&mut *state);
        (state.pages, state.errors)
    }
}
