//! Crawl orchestration
//!
//! This module owns the crawler state shared by every worker and the
//! top-level [`crawl`] entry point: config sanitization, HTTP client and
//! rate limiter construction, worker pools, frontier seeding, drain-based
//! termination, and the final report.

mod frontier;
mod limiter;
mod links;
mod worker;

pub use limiter::RateLimiter;
pub use links::{extract_links, extract_meta_refresh_target};

use crate::cache::VisitCache;
use crate::config::{Config, ProgressFn};
use crate::output::BoilerplateDetector;
use crate::report::{Report, Reporter, Stats};
use crate::robots::RobotsRegistry;
use crate::url::build_allowed_extensions;
use crate::CrawlError;
use chrono::Utc;
use frontier::PendingCounter;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use url::Url;

/// User agent sent with every outbound request
pub const USER_AGENT: &str = "linkcheck-bot/1.0";

const DEFAULT_MAX_WORKERS: usize = 8;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_REQUESTS_PER_MINUTE: usize = 60;

#[derive(Debug, Clone)]
pub(crate) struct InternalJob {
    pub url: String,
    pub depth: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct ExternalJob {
    pub url: String,
    pub source: String,
}

#[derive(Debug, Default)]
pub(crate) struct FrontierState {
    pub visited_internal: HashSet<String>,
    pub visited_external: HashSet<String>,
    pub stats: Stats,
}

/// Shared crawl state
pub(crate) struct Crawler {
    pub(crate) client: reqwest::Client,
    pub(crate) start: Url,
    pub(crate) start_url: String,
    pub(crate) allow_external: bool,
    pub(crate) max_pages: usize,
    pub(crate) max_depth: i32,
    pub(crate) allowed_ext: HashSet<String>,
    pub(crate) ignore_robots: bool,
    pub(crate) markdown_dir: Option<PathBuf>,
    pub(crate) progress: Option<ProgressFn>,

    pub(crate) internal_tx: StdMutex<Option<mpsc::Sender<InternalJob>>>,
    pub(crate) external_tx: StdMutex<Option<mpsc::Sender<ExternalJob>>>,
    pub(crate) internal_pending: Arc<PendingCounter>,
    pub(crate) external_pending: Arc<PendingCounter>,

    pub(crate) frontier: StdMutex<FrontierState>,
    pub(crate) reporter: Reporter,
    pub(crate) robots: RobotsRegistry,
    pub(crate) boilerplate: BoilerplateDetector,
    pub(crate) cache: VisitCache,
    pub(crate) limiter: RateLimiter,
    pub(crate) markdown_lock: StdMutex<()>,
    pub(crate) cancel: CancellationToken,
}

/// Performs the crawl described by `config` and returns a report
///
/// # Errors
///
/// Fails only on a missing or invalid start URL, an unsupported scheme, a
/// cache that cannot be loaded, or a cache that cannot be written at the
/// end. Everything else is recorded in the report.
pub async fn crawl(config: Config) -> Result<Report, CrawlError> {
    crawl_with_cancellation(config, CancellationToken::new()).await
}

/// Like [`crawl`], but cancellable
///
/// Cancelling the token aborts in-flight requests and rate-limit waits;
/// whatever state has been recorded by then is returned.
pub async fn crawl_with_cancellation(
    config: Config,
    cancel: CancellationToken,
) -> Result<Report, CrawlError> {
    let start = parse_start_url(&config.start_url)?;
    let start_url = start.to_string();

    let max_workers = if config.max_workers == 0 {
        DEFAULT_MAX_WORKERS
    } else {
        config.max_workers
    };
    let timeout = if config.timeout.is_zero() {
        DEFAULT_TIMEOUT
    } else {
        config.timeout
    };
    let requests_per_minute = if config.requests_per_minute == 0 {
        DEFAULT_REQUESTS_PER_MINUTE
    } else {
        config.requests_per_minute
    };
    let max_depth = config.max_depth.max(-1);

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .gzip(true)
        .build()?;

    let cache = VisitCache::load(config.cache_path.clone()).map_err(CrawlError::CacheLoad)?;
    // The start URL is always revisited, even when a previous run cached it.
    cache.evict(&start_url);

    // The crawl owns a child token so finishing normally also stops the
    // rate limiter's refill task.
    let cancel = cancel.child_token();
    let limiter = RateLimiter::start(requests_per_minute, max_workers, cancel.clone());

    let (internal_tx, internal_rx) = mpsc::channel::<InternalJob>(max_workers * 2);
    let external_workers = if config.allow_external {
        (max_workers / 2).max(2)
    } else {
        0
    };
    let (external_tx, external_rx) = if config.allow_external {
        let (tx, rx) = mpsc::channel::<ExternalJob>(max_workers);
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };

    let crawler = Arc::new(Crawler {
        client,
        start,
        start_url: start_url.clone(),
        allow_external: config.allow_external,
        max_pages: config.max_pages,
        max_depth,
        allowed_ext: build_allowed_extensions(&config.allowed_extensions),
        ignore_robots: config.ignore_robots,
        markdown_dir: config.markdown_dir.clone(),
        progress: config.progress.clone(),
        internal_tx: StdMutex::new(Some(internal_tx)),
        external_tx: StdMutex::new(external_tx),
        internal_pending: Arc::new(PendingCounter::default()),
        external_pending: Arc::new(PendingCounter::default()),
        frontier: StdMutex::new(FrontierState::default()),
        reporter: Reporter::new(),
        robots: RobotsRegistry::new(),
        boilerplate: BoilerplateDetector::new(),
        cache,
        limiter,
        markdown_lock: StdMutex::new(()),
        cancel: cancel.clone(),
    });

    tracing::info!(
        "starting crawl of {} with {} workers ({} rpm)",
        start_url,
        max_workers,
        requests_per_minute
    );

    let mut handles = Vec::with_capacity(max_workers + external_workers);
    let internal_rx = Arc::new(TokioMutex::new(internal_rx));
    for _ in 0..max_workers {
        let crawler = Arc::clone(&crawler);
        let rx = Arc::clone(&internal_rx);
        handles.push(tokio::spawn(async move {
            crawler.internal_worker(rx).await;
        }));
    }
    if let Some(external_rx) = external_rx {
        let external_rx = Arc::new(TokioMutex::new(external_rx));
        for _ in 0..external_workers {
            let crawler = Arc::clone(&crawler);
            let rx = Arc::clone(&external_rx);
            handles.push(tokio::spawn(async move {
                crawler.external_worker(rx).await;
            }));
        }
    }

    let started_at = Utc::now();
    let started = Instant::now();
    crawler.enqueue_internal(&start_url, 0);

    tokio::select! {
        _ = crawler.internal_pending.wait() => {}
        _ = cancel.cancelled() => {}
    }
    crawler.close_internal();

    if config.allow_external {
        tokio::select! {
            _ = crawler.external_pending.wait() => {}
            _ = cancel.cancelled() => {}
        }
    }
    crawler.close_external();

    // Stops the refill task and releases any workers still parked on the
    // drained channels.
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    let finished_at = Utc::now();
    let duration = started.elapsed();

    crawler.cache.write().map_err(CrawlError::CacheWrite)?;

    let stats = {
        let frontier = crawler.frontier.lock().unwrap();
        let mut stats = frontier.stats.clone();
        stats.unique_internal_pages = frontier.visited_internal.len() as u64;
        stats.unique_external_links = frontier.visited_external.len() as u64;
        stats.duration = duration;
        stats
    };
    let (pages, errors) = crawler.reporter.take_parts();

    tracing::info!(
        "crawl finished: {} pages, {} errors in {:.2?}",
        pages.len(),
        errors.len(),
        duration
    );

    Ok(Report {
        pages,
        errors,
        stats,
        started_at,
        finished_at,
    })
}

impl Crawler {
    async fn internal_worker(self: Arc<Self>, rx: Arc<TokioMutex<mpsc::Receiver<InternalJob>>>) {
        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => None,
                job = async { rx.lock().await.recv().await } => job,
            };
            let Some(job) = job else {
                return;
            };
            self.process_internal(job).await;
            self.internal_pending.done();
        }
    }

    async fn external_worker(self: Arc<Self>, rx: Arc<TokioMutex<mpsc::Receiver<ExternalJob>>>) {
        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => None,
                job = async { rx.lock().await.recv().await } => job,
            };
            let Some(job) = job else {
                return;
            };
            self.process_external(job).await;
            self.external_pending.done();
        }
    }
}

/// Parses and validates the start URL, defaulting a missing scheme to https
fn parse_start_url(raw: &str) -> Result<Url, CrawlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CrawlError::MissingStartUrl);
    }
    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{trimmed}"))
                .map_err(|e| CrawlError::InvalidStartUrl(e.to_string()))?
        }
        Err(e) => return Err(CrawlError::InvalidStartUrl(e.to_string())),
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CrawlError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    if parsed.host_str().is_none() {
        return Err(CrawlError::MissingHost);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_url_defaults_scheme() {
        let url = parse_start_url("example.com/docs").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs");
    }

    #[test]
    fn test_parse_start_url_rejects_empty() {
        assert!(matches!(
            parse_start_url("  "),
            Err(CrawlError::MissingStartUrl)
        ));
    }

    #[test]
    fn test_parse_start_url_rejects_bad_scheme() {
        assert!(matches!(
            parse_start_url("ftp://example.com/"),
            Err(CrawlError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_crawl_requires_start_url() {
        let result = crawl(Config::default()).await;
        assert!(matches!(result, Err(CrawlError::MissingStartUrl)));
    }
}
