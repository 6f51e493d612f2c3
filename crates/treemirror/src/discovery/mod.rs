//! Tree discovery: enumerating a repository's entries without their content.
//!
//! Two strategies produce the same stream of [`TreeEntry`] values through a
//! bounded channel:
//!
//! - [`DiscoveryStrategy::Api`] lists the whole tree in one structured request.
//! - [`DiscoveryStrategy::Scrape`] walks rendered directory pages depth-first.
//!
//! [`DiscoveryStrategy::Auto`] tries the API first and degrades to scraping
//! when the root request is rate limited or otherwise fails. A missing branch
//! is never degraded; it is reported as [`DiscoveryError::NotFound`] so the
//! caller can apply its branch fallback.

mod batch;
mod listing;
mod scrape;
mod visited;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::gateway::{Gateway, GatewayError};
use crate::reference::{Endpoints, RepositoryRef};

pub use visited::{VisitedSet, canonical_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Which surface a file locator points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSurface {
    /// Exact bytes.
    Raw,
    /// A rendered HTML page that needs extraction.
    Rendered,
}

/// One node of the remote tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Repository-relative, slash-separated.
    pub path: String,
    pub kind: EntryKind,
    /// URL for the entry's content (files) or listing (directories).
    pub locator: String,
    pub surface: ContentSurface,
    pub size_hint: Option<u64>,
}

impl TreeEntry {
    pub fn file(
        path: &str,
        locator: String,
        surface: ContentSurface,
        size_hint: Option<u64>,
    ) -> Self {
        Self {
            path: path.to_string(),
            kind: EntryKind::File,
            locator,
            surface,
            size_hint,
        }
    }

    pub fn directory(path: &str, locator: String) -> Self {
        Self {
            path: path.to_string(),
            kind: EntryKind::Directory,
            locator,
            surface: ContentSurface::Rendered,
            size_hint: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Structured API first, scraping when it is unavailable.
    #[default]
    Auto,
    Api,
    Scrape,
}

impl DiscoveryStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveryStrategy::Auto => "auto",
            DiscoveryStrategy::Api => "api",
            DiscoveryStrategy::Scrape => "scrape",
        }
    }
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "api" => Ok(Self::Api),
            "scrape" => Ok(Self::Scrape),
            other => Err(format!(
                "unknown discovery strategy '{other}' (expected auto, api or scrape)"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The repository or branch does not exist.
    #[error("Repository {owner}/{name} not found on branch '{branch}'")]
    NotFound {
        owner: String,
        name: String,
        branch: String,
    },

    /// A listing request failed. An empty path means the repository root.
    #[error("Failed to list '{path}': {source}")]
    Listing {
        path: String,
        #[source]
        source: GatewayError,
    },

    /// The remote answered with something unparseable.
    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl DiscoveryError {
    pub(crate) fn not_found(reference: &RepositoryRef) -> Self {
        Self::NotFound {
            owner: reference.owner.clone(),
            name: reference.name.clone(),
            branch: reference.branch.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Counters gathered by one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub directories_listed: usize,
    pub entries: usize,
    /// One message per directory whose listing failed.
    pub directory_errors: Vec<String>,
    /// The structured listing was cut short by the remote.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    /// The strategy that actually produced the entries (never `Auto`).
    pub strategy: DiscoveryStrategy,
    pub stats: DiscoveryStats,
}

/// Discover every entry of `reference`, sending each new one to `tx`.
///
/// Entries whose locator or path is already in `visited` are not sent again,
/// so no two sent entries share a path. If the
/// receiver goes away, discovery stops early and returns what it has.
pub async fn discover(
    gateway: &Gateway,
    endpoints: &Endpoints,
    reference: &RepositoryRef,
    strategy: DiscoveryStrategy,
    visited: &mut VisitedSet,
    tx: &mpsc::Sender<TreeEntry>,
) -> Result<DiscoveryOutcome, DiscoveryError> {
    match strategy {
        DiscoveryStrategy::Api => {
            let stats = batch::discover_batch(gateway, endpoints, reference, visited, tx).await?;
            Ok(DiscoveryOutcome {
                strategy: DiscoveryStrategy::Api,
                stats,
            })
        }
        DiscoveryStrategy::Scrape => {
            let stats = scrape::discover_scrape(gateway, endpoints, reference, visited, tx).await?;
            Ok(DiscoveryOutcome {
                strategy: DiscoveryStrategy::Scrape,
                stats,
            })
        }
        DiscoveryStrategy::Auto => {
            match batch::discover_batch(gateway, endpoints, reference, visited, tx).await {
                Ok(stats) => Ok(DiscoveryOutcome {
                    strategy: DiscoveryStrategy::Api,
                    stats,
                }),
                Err(e) if e.is_not_found() => Err(e),
                Err(e) => {
                    warn!(
                        reference = %reference,
                        error = %e,
                        "structured listing unavailable; falling back to scraping"
                    );
                    let stats =
                        scrape::discover_scrape(gateway, endpoints, reference, visited, tx).await?;
                    Ok(DiscoveryOutcome {
                        strategy: DiscoveryStrategy::Scrape,
                        stats,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::gateway::GatewayOptions;
    use crate::http::{HttpMethod, HttpResponse, MockTransport};

    fn reference() -> RepositoryRef {
        RepositoryRef::new("acme", "widgets")
    }

    async fn collect(
        transport: &MockTransport,
        strategy: DiscoveryStrategy,
    ) -> (Result<DiscoveryOutcome, DiscoveryError>, Vec<TreeEntry>) {
        let gateway =
            Gateway::with_transport(GatewayOptions::default(), Arc::new(transport.clone()));
        let mut visited = VisitedSet::new();
        let (tx, mut rx) = mpsc::channel(64);

        let result = discover(
            &gateway,
            &Endpoints::default(),
            &reference(),
            strategy,
            &mut visited,
            &tx,
        )
        .await;
        drop(tx);

        let mut entries = Vec::new();
        while let Some(entry) = rx.recv().await {
            entries.push(entry);
        }
        (result, entries)
    }

    fn api_url() -> String {
        Endpoints::default().tree_api_url(&reference()).to_string()
    }

    fn root_url() -> String {
        Endpoints::default().directory_url(&reference(), "").to_string()
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("SCRAPE".parse::<DiscoveryStrategy>(), Ok(DiscoveryStrategy::Scrape));
        assert_eq!(" api ".parse::<DiscoveryStrategy>(), Ok(DiscoveryStrategy::Api));
        assert!("browser".parse::<DiscoveryStrategy>().is_err());
        assert_eq!(DiscoveryStrategy::default().to_string(), "auto");
    }

    #[tokio::test]
    async fn api_entries_have_unique_paths() {
        let transport = MockTransport::new();
        transport.push_ok(
            api_url(),
            r#"{"tree":[
                {"path":"a.txt","type":"blob","size":1},
                {"path":"a.txt","type":"blob","size":1},
                {"path":"d","type":"tree"}
            ],"truncated":false}"#,
        );

        let (result, entries) = collect(&transport, DiscoveryStrategy::Api).await;
        let outcome = result.expect("discovery");

        assert_eq!(outcome.strategy, DiscoveryStrategy::Api);
        let unique: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(unique.len(), entries.len());
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn path_listed_as_file_and_directory_is_sent_once() {
        let transport = MockTransport::new();
        transport.push_ok(
            api_url(),
            r#"{"tree":[
                {"path":"a","type":"blob","size":3},
                {"path":"a","type":"tree"},
                {"path":"b","type":"tree"}
            ],"truncated":false}"#,
        );

        let (result, entries) = collect(&transport, DiscoveryStrategy::Api).await;
        assert_eq!(result.expect("discovery").stats.entries, 2);

        let paths: Vec<(&str, EntryKind)> =
            entries.iter().map(|e| (e.path.as_str(), e.kind)).collect();
        assert_eq!(paths, vec![("a", EntryKind::File), ("b", EntryKind::Directory)]);
    }

    #[tokio::test]
    async fn auto_falls_back_to_scraping_when_rate_limited() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            api_url(),
            HttpResponse {
                status: 403,
                headers: vec![("X-RateLimit-Remaining".into(), "0".into())],
                body: Vec::new(),
            },
        );
        transport.push_ok(
            root_url(),
            r#"<html><a href="/acme/widgets/blob/main/README.md">README.md</a></html>"#,
        );

        let (result, entries) = collect(&transport, DiscoveryStrategy::Auto).await;
        let outcome = result.expect("discovery");

        assert_eq!(outcome.strategy, DiscoveryStrategy::Scrape);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "README.md");
        assert_eq!(entries[0].surface, ContentSurface::Rendered);
    }

    #[tokio::test]
    async fn auto_does_not_mask_missing_branch() {
        let transport = MockTransport::new();
        transport.push_status(api_url(), 404);

        let (result, _) = collect(&transport, DiscoveryStrategy::Auto).await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(transport.request_count(&root_url()), 0);
    }

    #[tokio::test]
    async fn api_rate_limit_is_an_error_without_auto() {
        let transport = MockTransport::new();
        transport.push_status(api_url(), 429);

        let (result, _) = collect(&transport, DiscoveryStrategy::Api).await;
        match result.unwrap_err() {
            DiscoveryError::Listing { source, .. } => assert!(source.is_rate_limited()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.request_count(&api_url()), 1);
    }
}
