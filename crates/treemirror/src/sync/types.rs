//! Options, reports and errors for a mirror run.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::discovery::{DiscoveryError, DiscoveryStrategy};
use crate::reference::RepositoryRef;
use crate::stats::RunSummary;

/// Default number of concurrent file workers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Capacity of the channel between discovery and the worker pool.
pub const ENTRY_CHANNEL_BUFFER_SIZE: usize = 256;

/// Proxy credential prompts allowed before giving up.
pub const MAX_PROXY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum concurrent file workers.
    pub concurrency: usize,
    pub strategy: DiscoveryStrategy,
    /// Discover and report without fetching content or writing files.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            strategy: DiscoveryStrategy::Auto,
            dry_run: false,
        }
    }
}

/// Final report of a mirror run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// The reference actually mirrored, after any branch fallback.
    pub reference: RepositoryRef,
    /// The discovery strategy that produced the entries.
    pub strategy: DiscoveryStrategy,
    pub summary: RunSummary,
    pub directories_listed: usize,
    pub entries_discovered: usize,
    pub directory_errors: Vec<String>,
    /// The structured listing was truncated by the remote.
    pub truncated: bool,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub interrupted: bool,
    pub exclusive_session: bool,
    pub dry_run: bool,
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Neither the requested branch nor its fallback exists.
    #[error("Repository {owner}/{name} not found (branch '{branch}')")]
    RepositoryNotFound {
        owner: String,
        name: String,
        branch: String,
    },

    /// Discovery failed at the root.
    #[error(transparent)]
    Discovery(DiscoveryError),

    #[error("Failed to prepare destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The discovery task panicked.
    #[error("Task panicked: {0}")]
    TaskPanic(String),
}

impl From<DiscoveryError> for SyncError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::NotFound {
                owner,
                name,
                branch,
            } => Self::RepositoryNotFound {
                owner,
                name,
                branch,
            },
            other => Self::Discovery(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = SyncOptions::default();
        assert_eq!(options.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(options.strategy, DiscoveryStrategy::Auto);
        assert!(!options.dry_run);
    }

    #[test]
    fn not_found_discovery_becomes_repository_not_found() {
        let err = SyncError::from(DiscoveryError::NotFound {
            owner: "acme".into(),
            name: "widgets".into(),
            branch: "master".into(),
        });
        assert!(matches!(
            err,
            SyncError::RepositoryNotFound { ref branch, .. } if branch == "master"
        ));

        let err = SyncError::from(DiscoveryError::Malformed {
            url: "u".into(),
            message: "m".into(),
        });
        assert!(matches!(err, SyncError::Discovery(_)));
    }

    #[test]
    fn report_serializes_elapsed_as_seconds() {
        let report = SyncReport {
            reference: RepositoryRef::new("acme", "widgets"),
            strategy: DiscoveryStrategy::Api,
            summary: RunSummary::default(),
            directories_listed: 1,
            entries_discovered: 0,
            directory_errors: Vec::new(),
            truncated: false,
            elapsed: Duration::from_millis(1500),
            interrupted: false,
            exclusive_session: false,
            dry_run: false,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed_secs"], 1.5);
        assert_eq!(json["strategy"], "api");
        assert_eq!(json["reference"]["branch"], "main");
    }
}
