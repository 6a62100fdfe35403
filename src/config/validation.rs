use crate::config::FileConfig;
use crate::ConfigError;
use url::Url;

/// Validates a parsed configuration file before conversion
pub fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    validate_start_url(&config.crawler.start_url)?;

    if config.crawler.max_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "max-workers must be >= 1, got {}",
            config.crawler.max_workers
        )));
    }

    if config.crawler.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.crawler.timeout_secs
        )));
    }

    if config.crawler.requests_per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "requests-per-minute must be >= 1, got {}",
            config.crawler.requests_per_minute
        )));
    }

    Ok(())
}

/// Validates the start URL: must parse, use http/https, and carry a host.
///
/// A scheme-less value is accepted because the crawl entry point defaults
/// it to https before use.
fn validate_start_url(raw: &str) -> Result<(), ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Validation(
            "start-url cannot be empty".to_string(),
        ));
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{trimmed}")).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid start-url '{trimmed}': {e}"))
            })?
        }
        Err(e) => {
            return Err(ConfigError::InvalidUrl(format!(
                "Invalid start-url '{trimmed}': {e}"
            )))
        }
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "start-url must use http or https, got '{}'",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none() {
        return Err(ConfigError::Validation(
            "start-url must include a host".to_string(),
        ));
    }

    Ok(())
}
