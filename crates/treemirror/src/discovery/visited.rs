use std::collections::HashSet;

use url::Url;

/// Locators already scheduled during one run, plus the relative paths
/// already emitted.
///
/// Owned by the discovery task alone, so no lock is involved.
#[derive(Debug, Default)]
pub struct VisitedSet {
    keys: HashSet<String>,
    paths: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `locator`; returns `true` if it had not been seen before.
    pub fn insert(&mut self, locator: &str) -> bool {
        self.keys.insert(canonical_key(locator))
    }

    /// Claim `path` for one entry; returns `false` if another entry (of any
    /// kind) already holds it.
    pub fn claim_path(&mut self, path: &str) -> bool {
        self.paths.insert(path.trim_matches('/').to_string())
    }

    /// Record an entry's locator and path; `true` only if both are new.
    pub fn admit(&mut self, locator: &str, path: &str) -> bool {
        self.insert(locator) && self.claim_path(path)
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.keys.contains(&canonical_key(locator))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Canonical form of a locator: no query, no fragment, no trailing slash.
pub fn canonical_key(locator: &str) -> String {
    match Url::parse(locator) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => locator.trim_end_matches('/').to_string(),
    }
}
