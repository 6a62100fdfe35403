//! Robots.txt handling for linkcheck
//!
//! Rule parsing lives in [`parser`]; this module provides the per-host
//! registry the crawler consults. Groups are fetched lazily on the first
//! request for a host and cached for the duration of the run. A `None`
//! entry records that the host has no restrictions (fetch failed, status
//! >= 400, or no matching agent group).

mod parser;

pub use parser::{parse_rules, RuleGroup};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-run cache of resolved robots.txt rule groups, keyed by lowercase host
#[derive(Debug, Default)]
pub struct RobotsRegistry {
    groups: Mutex<HashMap<String, Option<Arc<RuleGroup>>>>,
}

impl RobotsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for a host, if one exists
    ///
    /// The outer `Option` distinguishes "never fetched" from a cached
    /// "no restrictions" result.
    pub fn lookup(&self, host: &str) -> Option<Option<Arc<RuleGroup>>> {
        self.groups.lock().unwrap().get(host).cloned()
    }

    /// Stores the fetched group for a host and returns the cached value
    pub fn insert(&self, host: String, group: Option<RuleGroup>) -> Option<Arc<RuleGroup>> {
        let entry = group.map(Arc::new);
        self.groups.lock().unwrap().insert(host, entry.clone());
        entry
    }
}
