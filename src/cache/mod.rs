//! Persistent visit cache
//!
//! The cache records which URLs previous runs have visited, keyed by
//! normalized URL, and is serialized as a small indented JSON document.
//! Its role is deliberately narrow: "have we ever visited this URL".
//! Depth and page-limit decisions stay with the frontier.

use crate::output::markdown_file_path;
use crate::report::PageReport;
use crate::CacheError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// One visited-URL record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(rename = "lastVisited")]
    pub last_visited: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheData {
    #[serde(default)]
    visited: HashMap<String, CacheEntry>,
}

/// Thread-safe visit cache bound to an optional file path
///
/// With no path configured every operation is a no-op and nothing is ever
/// considered cached.
#[derive(Debug)]
pub struct VisitCache {
    path: Option<PathBuf>,
    data: RwLock<CacheData>,
}

impl VisitCache {
    /// Loads the cache from `path`
    ///
    /// A missing or empty file yields an empty cache; malformed JSON is an
    /// error.
    pub fn load(path: Option<PathBuf>) -> Result<Self, CacheError> {
        let Some(ref file) = path else {
            return Ok(Self {
                path,
                data: RwLock::new(CacheData::default()),
            });
        };

        let data = match fs::read(file) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => CacheData::default(),
            Err(err) => return Err(err.into()),
            Ok(payload) if payload.is_empty() => CacheData::default(),
            Ok(payload) => serde_json::from_slice(&payload)?,
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Removes a URL from the loaded cache so this run will revisit it
    pub fn evict(&self, url: &str) {
        if self.path.is_none() {
            return;
        }
        self.data.write().unwrap().visited.remove(url);
    }

    /// Whether the URL was present in the loaded cache
    pub fn contains(&self, url: &str) -> bool {
        if self.path.is_none() {
            return false;
        }
        self.data.read().unwrap().visited.contains_key(url)
    }

    /// Cache-skip decision for a URL
    ///
    /// A cached URL is skipped outright when no Markdown directory is
    /// configured. With one configured, the URL is only skipped when its
    /// expected export file already exists, so a cached URL that was never
    /// exported gets exported now.
    pub fn should_skip(&self, url: &str, markdown_dir: Option<&Path>) -> bool {
        if !self.contains(url) {
            return false;
        }
        let Some(dir) = markdown_dir else {
            return true;
        };
        match markdown_file_path(dir, url) {
            Some(expected) => expected.exists(),
            None => true,
        }
    }

    /// Records the outcome of a page visit
    pub fn update(&self, page: &PageReport, visited_at: DateTime<Utc>) {
        if self.path.is_none() || page.url.is_empty() {
            return;
        }
        let entry = CacheEntry {
            url: page.url.clone(),
            status: page.status,
            error: page.error.clone(),
            last_visited: visited_at,
        };
        self.data
            .write()
            .unwrap()
            .visited
            .insert(page.url.clone(), entry);
    }

    /// Serializes the cache back to its file, creating parent directories
    pub fn write(&self) -> Result<(), CacheError> {
        let Some(ref file) = self.path else {
            return Ok(());
        };
        let payload = {
            let data = self.data.read().unwrap();
            serde_json::to_vec_pretty(&*data)?
        };
        if let Some(parent) = file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(file, payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page(url: &str, status: u16) -> PageReport {
        let mut page = PageReport::new(url);
        page.status = status;
        page
    }

    #[test]
    fn test_no_path_is_inert() {
        let cache = VisitCache::load(None).expect("load without path");
        cache.update(&page("https://example.com/", 200), Utc::now());
        assert!(!cache.contains("https://example.com/"));
        assert!(!cache.should_skip("https://example.com/", None));
        cache.write().expect("write is a no-op");
    }

    #[test]
    fn test_missing_file_yields_empty_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = VisitCache::load(Some(path)).expect("load missing file");
        assert!(!cache.contains("https://example.com/"));
    }

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = VisitCache::load(Some(path.clone())).unwrap();
        cache.update(&page("https://example.com/a", 200), Utc::now());
        cache.update(
            &PageReport::with_error("https://example.com/b", "status 404"),
            Utc::now(),
        );
        cache.write().expect("write cache");

        let reloaded = VisitCache::load(Some(path)).unwrap();
        assert!(reloaded.contains("https://example.com/a"));
        assert!(reloaded.contains("https://example.com/b"));
        assert!(!reloaded.contains("https://example.com/c"));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(VisitCache::load(Some(path)).is_err());
    }

    #[test]
    fn test_empty_file_yields_empty_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"").unwrap();
        let cache = VisitCache::load(Some(path)).expect("empty file accepted");
        assert!(!cache.contains("https://example.com/"));
    }

    #[test]
    fn test_evict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = VisitCache::load(Some(path)).unwrap();
        cache.update(&page("https://example.com/start", 200), Utc::now());
        assert!(cache.contains("https://example.com/start"));
        cache.evict("https://example.com/start");
        assert!(!cache.contains("https://example.com/start"));
    }

    #[test]
    fn test_skip_without_markdown_dir() {
        let dir = TempDir::new().unwrap();
        let cache = VisitCache::load(Some(dir.path().join("cache.json"))).unwrap();
        cache.update(&page("https://example.com/page", 200), Utc::now());
        assert!(cache.should_skip("https://example.com/page", None));
        assert!(!cache.should_skip("https://example.com/other", None));
    }

    #[test]
    fn test_skip_depends_on_export_file() {
        let dir = TempDir::new().unwrap();
        let markdown_dir = dir.path().join("mirror");
        let cache = VisitCache::load(Some(dir.path().join("cache.json"))).unwrap();
        cache.update(&page("https://example.com/page", 200), Utc::now());

        // No export yet: the cached URL must be revisited.
        assert!(!cache.should_skip("https://example.com/page", Some(&markdown_dir)));

        let expected = markdown_file_path(&markdown_dir, "https://example.com/page").unwrap();
        fs::create_dir_all(expected.parent().unwrap()).unwrap();
        fs::write(&expected, b"---\n---\n\nbody\n").unwrap();
        assert!(cache.should_skip("https://example.com/page", Some(&markdown_dir)));
    }

    #[test]
    fn test_serialized_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = VisitCache::load(Some(path.clone())).unwrap();
        cache.update(&page("https://example.com/", 200), Utc::now());
        cache.write().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"visited\""));
        assert!(raw.contains("\"lastVisited\""));
        // Successful visits have no error field at all.
        assert!(!raw.contains("\"error\""));
    }
}
