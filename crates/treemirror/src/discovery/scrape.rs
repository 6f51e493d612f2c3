//! Recursive discovery over rendered directory pages.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::listing::parse_listing;
use super::visited::VisitedSet;
use super::{ContentSurface, DiscoveryError, DiscoveryStats, EntryKind, TreeEntry};
use crate::gateway::{FetchMode, Gateway, GatewayError, short_error_message};
use crate::reference::{Endpoints, RepositoryRef};

/// Depth-first walk from the repository root.
///
/// Directories are listed one at a time. Files are sent as soon as their
/// directory page is parsed so downloads overlap with the walk. A failing
/// root listing aborts; a failing subdirectory is recorded and skipped.
pub(crate) async fn discover_scrape(
    gateway: &Gateway,
    endpoints: &Endpoints,
    reference: &RepositoryRef,
    visited: &mut VisitedSet,
    tx: &mpsc::Sender<TreeEntry>,
) -> Result<DiscoveryStats, DiscoveryError> {
    let mut stats = DiscoveryStats::default();

    let root = endpoints.directory_url(reference, "");
    visited.insert(root.as_str());
    let mut stack: Vec<(String, Url)> = vec![(String::new(), root)];

    info!(reference = %reference, "walking rendered directory pages");

    while let Some((directory, page_url)) = stack.pop() {
        let body = match gateway.fetch(page_url.as_str(), FetchMode::Rendered).await {
            Ok(fetched) => fetched.into_text(),
            Err(GatewayError::NotFound { .. }) if directory.is_empty() => {
                return Err(DiscoveryError::not_found(reference));
            }
            Err(source) if directory.is_empty() => {
                return Err(DiscoveryError::Listing {
                    path: String::new(),
                    source,
                });
            }
            Err(e) => {
                warn!(
                    directory = %directory,
                    error = %e,
                    "directory listing failed; treating as empty"
                );
                stats
                    .directory_errors
                    .push(format!("{directory}: {}", short_error_message(&e)));
                continue;
            }
        };

        stats.directories_listed += 1;
        let children = parse_listing(&body, &page_url, endpoints, reference, &directory);
        debug!(directory = %directory, children = children.len(), "listed directory");

        let mut subdirectories = Vec::new();
        for child in children {
            let entry = match child.kind {
                EntryKind::Directory => TreeEntry::directory(
                    &child.path,
                    endpoints.directory_url(reference, &child.path).to_string(),
                ),
                EntryKind::File => TreeEntry::file(
                    &child.path,
                    endpoints.file_url(reference, &child.path).to_string(),
                    ContentSurface::Rendered,
                    None,
                ),
            };

            if !visited.admit(&entry.locator, &entry.path) {
                continue;
            }
            if entry.kind == EntryKind::Directory {
                subdirectories.push((
                    entry.path.clone(),
                    endpoints.directory_url(reference, &entry.path),
                ));
            }

            stats.entries += 1;
            if tx.send(entry).await.is_err() {
                debug!("entry receiver closed; stopping discovery");
                return Ok(stats);
            }
        }

        // Reverse so the first listed subdirectory is walked first.
        stack.extend(subdirectories.into_iter().rev());
    }

    Ok(stats)
}
