//! TOML configuration loading

use crate::config::{validate, Config, FileConfig};
use crate::ConfigResult;
use std::fs;
use std::path::Path;

/// Loads, validates, and converts a TOML configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Validated runtime configuration
/// * `Err(ConfigError)` - Read, parse, or validation failure
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let contents = fs::read_to_string(path)?;
    let file_config: FileConfig = toml::from_str(&contents)?;
    validate(&file_config)?;
    Ok(file_config.into_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = write_config(
            r#"
[crawler]
start-url = "https://example.com/"
"#,
        );

        let config = load_config(file.path()).expect("config should load");
        assert_eq!(config.start_url, "https://example.com/");
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.requests_per_minute, 60);
        assert_eq!(config.max_depth, -1);
        assert_eq!(config.max_pages, 0);
        assert!(!config.allow_external);
        assert!(!config.ignore_robots);
        assert!(config.cache_path.is_none());
        assert!(config.markdown_dir.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
[crawler]
start-url = "https://example.com/docs"
allow-external = true
max-workers = 4
timeout-secs = 30
max-pages = 100
max-depth = 3
requests-per-minute = 120
allowed-extensions = ["", ".html", "php"]
ignore-robots = true

[output]
cache-path = "state/cache.json"
markdown-dir = "mirror"
"#,
        );

        let config = load_config(file.path()).expect("config should load");
        assert!(config.allow_external);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.requests_per_minute, 120);
        assert_eq!(config.allowed_extensions, vec!["", ".html", "php"]);
        assert!(config.ignore_robots);
        assert_eq!(
            config.cache_path.as_deref(),
            Some(std::path::Path::new("state/cache.json"))
        );
        assert_eq!(
            config.markdown_dir.as_deref(),
            Some(std::path::Path::new("mirror"))
        );
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = write_config("this is not toml {{{");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config(std::path::Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_rejects_invalid_start_url() {
        let file = write_config(
            r#"
[crawler]
start-url = "ftp://example.com/"
"#,
        );
        assert!(load_config(file.path()).is_err());
    }
}
