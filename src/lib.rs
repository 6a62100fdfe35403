//! Linkcheck: a polite site link checker and Markdown mirror
//!
//! This crate crawls a site from a single start URL, classifies discovered
//! links as internal or external, checks them while respecting robots.txt
//! and a global request-rate budget, and can mirror every internal page as
//! a Markdown document with frontmatter.

pub mod cache;
pub mod config;
pub mod convert;
pub mod crawler;
pub mod output;
pub mod report;
pub mod robots;
pub mod url;

use thiserror::Error;

/// Main error type for linkcheck operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("start URL is required")]
    MissingStartUrl,

    #[error("invalid start URL: {0}")]
    InvalidStartUrl(String),

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("start URL must include a host")]
    MissingHost,

    #[error("load cache: {0}")]
    CacheLoad(#[source] CacheError),

    #[error("write cache: {0}")]
    CacheWrite(#[source] CacheError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors raised while loading or persisting the visit cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed cache file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for linkcheck operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, crawl_with_cancellation, USER_AGENT};
pub use report::{ErrorKind, ErrorRecord, Link, LinkKind, PageReport, Report, Stats};
