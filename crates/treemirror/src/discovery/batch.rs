//! Single-request discovery through the recursive tree API.

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::visited::VisitedSet;
use super::{ContentSurface, DiscoveryError, DiscoveryStats, TreeEntry};
use crate::gateway::{FetchMode, Gateway, GatewayError};
use crate::reference::{Endpoints, RepositoryRef};

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeObject>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeObject {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

/// Parse a tree API document into entries. Submodule commits are dropped.
pub(crate) fn parse_tree_response(
    endpoints: &Endpoints,
    reference: &RepositoryRef,
    url: &str,
    body: &str,
) -> Result<(Vec<TreeEntry>, bool), DiscoveryError> {
    let response: TreeResponse =
        serde_json::from_str(body).map_err(|e| DiscoveryError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    let entries = response
        .tree
        .into_iter()
        .filter_map(|object| match object.kind.as_str() {
            "blob" => Some(TreeEntry::file(
                &object.path,
                endpoints.raw_url(reference, &object.path).to_string(),
                ContentSurface::Raw,
                object.size,
            )),
            "tree" => Some(TreeEntry::directory(
                &object.path,
                endpoints.directory_url(reference, &object.path).to_string(),
            )),
            _ => None,
        })
        .collect();

    Ok((entries, response.truncated))
}

pub(crate) async fn discover_batch(
    gateway: &Gateway,
    endpoints: &Endpoints,
    reference: &RepositoryRef,
    visited: &mut VisitedSet,
    tx: &mpsc::Sender<TreeEntry>,
) -> Result<DiscoveryStats, DiscoveryError> {
    let url = endpoints.tree_api_url(reference).to_string();
    info!(reference = %reference, "listing tree via API");

    let body = match gateway.fetch(&url, FetchMode::Structured).await {
        Ok(fetched) => fetched.into_text(),
        Err(GatewayError::NotFound { .. }) => return Err(DiscoveryError::not_found(reference)),
        Err(source) => {
            return Err(DiscoveryError::Listing {
                path: String::new(),
                source,
            });
        }
    };

    let (entries, truncated) = parse_tree_response(endpoints, reference, &url, &body)?;
    if truncated {
        warn!(
            reference = %reference,
            entries = entries.len(),
            "tree listing was truncated by the remote; continuing with listed entries"
        );
    }

    let mut stats = DiscoveryStats {
        directories_listed: 1,
        truncated,
        ..DiscoveryStats::default()
    };

    for entry in entries {
        if !visited.admit(&entry.locator, &entry.path) {
            debug!(path = %entry.path, "duplicate path in tree listing; skipped");
            continue;
        }
        stats.entries += 1;
        if tx.send(entry).await.is_err() {
            debug!("entry receiver closed; stopping discovery");
            break;
        }
    }

    Ok(stats)
}
