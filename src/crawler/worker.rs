//! Per-job processing for internal pages and external link checks
//!
//! Each internal job runs the fetch-parse-extract pipeline: robots gate,
//! token acquire, request, bounded body read, link extraction, Markdown
//! export, report and cache commit. External jobs are reachability checks
//! only; their bodies are discarded and failures never produce page
//! records.

use crate::crawler::links::{classify, extract_links, extract_meta_refresh_target};
use crate::crawler::{Crawler, ExternalJob, InternalJob, USER_AGENT};
use crate::report::{ErrorKind, ErrorRecord, Link, LinkKind, PageReport};
use crate::robots::{parse_rules, RuleGroup};
use crate::url::normalize_url;
use chrono::Utc;
use std::time::Instant;
use url::Url;

/// Hard cap on page body bytes
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Hard cap on robots.txt bytes
const MAX_ROBOTS_BYTES: usize = 512 * 1024;

impl Crawler {
    pub(crate) async fn process_internal(&self, job: InternalJob) {
        let started = Instant::now();
        self.emit_progress(&job.url);

        let parsed = match Url::parse(&job.url) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.reporter.record_error(ErrorRecord {
                    source: job.url.clone(),
                    target: job.url.clone(),
                    kind: ErrorKind::Parse,
                    message: err.to_string(),
                    status: 0,
                });
                self.reporter
                    .save_page(PageReport::with_error(&job.url, err.to_string()));
                return;
            }
        };

        if !self.allowed_by_robots(&parsed).await {
            self.record_skipped_robots();
            tracing::debug!("robots.txt disallows {}", job.url);
            let page = PageReport::with_error(&job.url, "blocked by robots.txt");
            self.cache.update(&page, Utc::now());
            self.reporter.save_page(page);
            return;
        }
        self.record_visit();

        if !self.limiter.acquire(&self.cancel).await {
            let reason = "rate limit reached";
            self.reporter.record_error(ErrorRecord {
                source: job.url.clone(),
                target: job.url.clone(),
                kind: ErrorKind::Rate,
                message: reason.to_string(),
                status: 0,
            });
            let page = PageReport::with_error(&job.url, reason);
            self.cache.update(&page, Utc::now());
            self.reporter.save_page(page);
            return;
        }

        let response = match self.client.get(&job.url).send().await {
            Ok(response) => response,
            Err(err) => {
                let message = err.to_string();
                self.reporter.record_error(ErrorRecord {
                    source: job.url.clone(),
                    target: job.url.clone(),
                    kind: ErrorKind::Request,
                    message: message.clone(),
                    status: 0,
                });
                let page = PageReport::with_error(&job.url, message);
                self.cache.update(&page, Utc::now());
                self.reporter.save_page(page);
                return;
            }
        };

        let status = response.status().as_u16();
        let body = match read_body_limited(response, MAX_BODY_BYTES).await {
            Ok(body) => body,
            Err(err) => {
                let message = err.to_string();
                self.reporter.record_error(ErrorRecord {
                    source: job.url.clone(),
                    target: job.url.clone(),
                    kind: ErrorKind::Read,
                    message: message.clone(),
                    status,
                });
                let mut page = PageReport::with_error(&job.url, message);
                page.status = status;
                page.retrieved = started.elapsed();
                self.cache.update(&page, Utc::now());
                self.reporter.save_page(page);
                return;
            }
        };

        let mut links = extract_links(&self.start, &body, &job.url);
        if let Some(target) = extract_meta_refresh_target(&body) {
            if let Some(normalized) = normalize_url(&self.start, &target) {
                let normalized_str = normalized.to_string();
                if !links.iter().any(|link| link.url == normalized_str) {
                    links.push(Link {
                        kind: classify(&self.start, &normalized),
                        url: normalized_str,
                    });
                }
            }
        }

        let mut page = PageReport::new(&job.url);
        page.status = status;
        page.links = links.clone();
        page.retrieved = started.elapsed();
        if status >= 400 {
            let message = format!("status {status}");
            self.reporter.record_error(ErrorRecord {
                source: job.url.clone(),
                target: job.url.clone(),
                kind: ErrorKind::Http,
                message: message.clone(),
                status,
            });
            page.error = message;
        }

        for link in &links {
            match link.kind {
                LinkKind::Internal => {
                    self.record_internal_link();
                    self.enqueue_internal(&link.url, job.depth + 1);
                }
                LinkKind::External => {
                    self.record_external_link();
                    if self.allow_external {
                        self.enqueue_external(&link.url, &job.url);
                    }
                }
            }
        }

        let visited_at = Utc::now();
        self.export_markdown(&mut page, &body, visited_at);
        self.cache.update(&page, visited_at);
        self.reporter.save_page(page);
    }

    pub(crate) async fn process_external(&self, job: ExternalJob) {
        self.emit_progress(&job.url);
        let parsed = match Url::parse(&job.url) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.reporter.record_error(ErrorRecord {
                    source: job.source.clone(),
                    target: job.url.clone(),
                    kind: ErrorKind::Parse,
                    message: err.to_string(),
                    status: 0,
                });
                return;
            }
        };

        if !self.allowed_by_robots(&parsed).await {
            self.record_skipped_robots();
            return;
        }
        if !self.limiter.acquire(&self.cancel).await {
            self.reporter.record_error(ErrorRecord {
                source: job.source.clone(),
                target: job.url.clone(),
                kind: ErrorKind::Rate,
                message: "rate limit reached".to_string(),
                status: 0,
            });
            return;
        }

        match self.client.get(&job.url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                // The body is dropped unread; this is a reachability check.
                drop(response);
                if status >= 400 {
                    self.reporter.record_error(ErrorRecord {
                        source: job.source.clone(),
                        target: job.url.clone(),
                        kind: ErrorKind::Http,
                        message: format!("status {status}"),
                        status,
                    });
                }
            }
            Err(err) => {
                self.reporter.record_error(ErrorRecord {
                    source: job.source.clone(),
                    target: job.url.clone(),
                    kind: ErrorKind::Request,
                    message: err.to_string(),
                    status: 0,
                });
                return;
            }
        }

        self.record_external_checked();
    }

    /// Robots gate for one URL, fetching the host's rules on first use
    ///
    /// Any fetch failure, status >= 400, or rate-limit cancellation during
    /// the robots fetch leaves the host unrestricted for the rest of the
    /// run.
    pub(crate) async fn allowed_by_robots(&self, url: &Url) -> bool {
        if self.ignore_robots {
            return true;
        }
        let Some(host) = url.host_str() else {
            return true;
        };
        let host_key = match url.port() {
            Some(port) => format!("{}:{port}", host.to_lowercase()),
            None => host.to_lowercase(),
        };

        let group = match self.robots.lookup(&host_key) {
            Some(cached) => cached,
            None => {
                let fetched = self.fetch_robots(url).await;
                self.robots.insert(host_key, fetched)
            }
        };
        let Some(group) = group else {
            return true;
        };

        let path = url.path();
        let path = if path.is_empty() { "/" } else { path };
        group.allows_path(path)
    }

    async fn fetch_robots(&self, url: &Url) -> Option<RuleGroup> {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        if !self.limiter.acquire(&self.cancel).await {
            return None;
        }
        let response = self.client.get(robots_url.as_str()).send().await.ok()?;
        if response.status().as_u16() >= 400 {
            return None;
        }
        let body = read_body_limited(response, MAX_ROBOTS_BYTES).await.ok()?;
        parse_rules(&body, USER_AGENT)
    }

    pub(crate) fn emit_progress(&self, url: &str) {
        if let Some(ref progress) = self.progress {
            progress(url);
        }
    }
}

/// Reads a response body up to `limit` bytes, truncating past the limit
async fn read_body_limited(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, reqwest::Error> {
    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            body.extend_from_slice(&chunk[..limit - body.len()]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
