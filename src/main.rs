//! Linkcheck main entry point
//!
//! Command-line interface for the linkcheck crawler.

use clap::Parser;
use linkcheck::config::load_config;
use linkcheck::report::{Report, Stats};
use linkcheck::{crawl, Config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Linkcheck: a polite site link checker and Markdown mirror
///
/// Crawls a site from its start URL, verifies internal and (optionally)
/// external links while respecting robots.txt and a global request-rate
/// budget, and can mirror every internal page as Markdown.
#[derive(Parser, Debug)]
#[command(name = "linkcheck")]
#[command(version = "1.0.0")]
#[command(about = "A polite site link checker and Markdown mirror", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let report = match crawl(config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    if !cli.quiet {
        print_report(&report);
    }
    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkcheck=info,warn"),
            1 => EnvFilter::new("linkcheck=debug,info"),
            2 => EnvFilter::new("linkcheck=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: shows the validated configuration and exits
fn handle_dry_run(config: &Config) {
    println!("=== Linkcheck Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Start URL: {}", config.start_url);
    println!("  Workers: {}", config.max_workers);
    println!("  Timeout: {:?}", config.timeout);
    println!("  Max pages: {}", config.max_pages);
    println!("  Max depth: {}", config.max_depth);
    println!("  Requests per minute: {}", config.requests_per_minute);
    println!("  Check external links: {}", config.allow_external);
    println!("  Ignore robots.txt: {}", config.ignore_robots);

    println!("\nOutput:");
    match config.cache_path {
        Some(ref path) => println!("  Cache: {}", path.display()),
        None => println!("  Cache: disabled"),
    }
    match config.markdown_dir {
        Some(ref dir) => println!("  Markdown mirror: {}", dir.display()),
        None => println!("  Markdown mirror: disabled"),
    }

    println!("\n✓ Configuration is valid");
}

/// Prints the end-of-run summary
fn print_report(report: &Report) {
    let stats: &Stats = &report.stats;
    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Pages visited: {}", stats.pages_visited);
    println!("  Unique internal pages: {}", stats.unique_internal_pages);
    println!("  Unique external links: {}", stats.unique_external_links);
    println!("  Internal links seen: {}", stats.total_internal_links);
    println!("  External links seen: {}", stats.total_external_links);
    println!("  External links checked: {}", stats.external_links_checked);
    println!("  Duration: {:.2?}", stats.duration);
    println!();

    println!("Skipped:");
    println!("  By cache: {}", stats.skipped_by_cache);
    println!("  By robots.txt: {}", stats.skipped_by_robots);
    println!("  By extension filter: {}", stats.skipped_by_extension);
    println!("  By page limit: {}", stats.skipped_by_limit);
    println!("  By depth limit: {}", stats.skipped_by_depth);
    println!();

    let exported = report
        .pages
        .values()
        .filter(|page| page.markdown_path.is_some())
        .count();
    if exported > 0 {
        println!("Markdown exports written: {exported}");
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for error in report.errors.iter().take(20) {
            println!("  [{}] {} -> {}: {}", error.kind, error.source, error.target, error.message);
        }
        if report.errors.len() > 20 {
            println!("  ... and {} more", report.errors.len() - 20);
        }
    }
}
