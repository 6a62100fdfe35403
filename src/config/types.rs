use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked with each URL as its job starts
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Runtime crawler configuration
///
/// A zero value (via `Default`) is usable: the crawl entry point fills in
/// the documented defaults for workers, timeout, and request rate.
#[derive(Clone, Default)]
pub struct Config {
    /// Absolute http/https URL the crawl starts from (scheme defaults to https)
    pub start_url: String,

    /// Check external links for reachability with a GET per link
    pub allow_external: bool,

    /// Number of internal workers (0 means the default of 8); external
    /// workers are `max(2, max_workers / 2)` when `allow_external` is set
    pub max_workers: usize,

    /// Per-request timeout (zero means the default of 15 seconds)
    pub timeout: Duration,

    /// Cap on unique internal URLs admitted to the frontier (0 = unlimited)
    pub max_pages: usize,

    /// Maximum link depth from the start URL; -1 = unlimited, 0 = start only
    pub max_depth: i32,

    /// Global cap on outbound HTTP requests per minute (0 means 60)
    pub requests_per_minute: usize,

    /// Allowed path extensions; empty means `{"", ".html", ".htm"}`
    pub allowed_extensions: Vec<String>,

    /// Skip robots.txt fetching and gating entirely
    pub ignore_robots: bool,

    /// Path of the JSON visit cache; `None` disables caching
    pub cache_path: Option<PathBuf>,

    /// Directory for Markdown page exports; `None` disables exporting
    pub markdown_dir: Option<PathBuf>,

    /// Progress callback invoked per processed URL
    pub progress: Option<ProgressFn>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("start_url", &self.start_url)
            .field("allow_external", &self.allow_external)
            .field("max_workers", &self.max_workers)
            .field("timeout", &self.timeout)
            .field("max_pages", &self.max_pages)
            .field("max_depth", &self.max_depth)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("allowed_extensions", &self.allowed_extensions)
            .field("ignore_robots", &self.ignore_robots)
            .field("cache_path", &self.cache_path)
            .field("markdown_dir", &self.markdown_dir)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// On-disk configuration file structure (TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub crawler: CrawlerSection,
    #[serde(default)]
    pub output: OutputSection,
}

/// `[crawler]` section of the config file
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerSection {
    #[serde(rename = "start-url")]
    pub start_url: String,

    #[serde(rename = "allow-external", default)]
    pub allow_external: bool,

    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "max-pages", default)]
    pub max_pages: usize,

    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: i32,

    #[serde(rename = "requests-per-minute", default = "default_requests_per_minute")]
    pub requests_per_minute: usize,

    #[serde(rename = "allowed-extensions", default)]
    pub allowed_extensions: Vec<String>,

    #[serde(rename = "ignore-robots", default)]
    pub ignore_robots: bool,
}

/// `[output]` section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSection {
    #[serde(rename = "cache-path")]
    pub cache_path: Option<PathBuf>,

    #[serde(rename = "markdown-dir")]
    pub markdown_dir: Option<PathBuf>,
}

fn default_max_workers() -> usize {
    8
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_depth() -> i32 {
    -1
}

fn default_requests_per_minute() -> usize {
    60
}

impl FileConfig {
    /// Converts the file representation into a runtime [`Config`]
    pub fn into_config(self) -> Config {
        Config {
            start_url: self.crawler.start_url,
            allow_external: self.crawler.allow_external,
            max_workers: self.crawler.max_workers,
            timeout: Duration::from_secs(self.crawler.timeout_secs),
            max_pages: self.crawler.max_pages,
            max_depth: self.crawler.max_depth,
            requests_per_minute: self.crawler.requests_per_minute,
            allowed_extensions: self.crawler.allowed_extensions,
            ignore_robots: self.crawler.ignore_robots,
            cache_path: self.output.cache_path,
            markdown_dir: self.output.markdown_dir,
            progress: None,
        }
    }
}
