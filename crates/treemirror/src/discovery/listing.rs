//! Directory listing parsers for rendered pages.
//!
//! An embedded payload is preferred. Pages without one fall back to anchor
//! scanning, keeping only `tree`/`blob` links inside the target repository and
//! branch that point below the listed directory.

use std::collections::HashSet;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use url::Url;

use super::EntryKind;
use crate::payload;
use crate::reference::{Endpoints, RepositoryRef};

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("selector should parse"));

/// One child found on a directory page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListedChild {
    pub path: String,
    pub kind: EntryKind,
}

/// Parse the children of `directory` from its rendered page.
///
/// Returned paths are unique and repository-relative.
pub(crate) fn parse_listing(
    body: &str,
    page_url: &Url,
    endpoints: &Endpoints,
    reference: &RepositoryRef,
    directory: &str,
) -> Vec<ListedChild> {
    let document = Html::parse_document(body);

    let children = match payload::tree_items(&document) {
        Some(items) => items
            .into_iter()
            .filter_map(|item| {
                let kind = match item.content_type.as_str() {
                    "directory" => EntryKind::Directory,
                    "file" | "symlink_file" => EntryKind::File,
                    _ => return None,
                };
                let path = item.path.trim_matches('/').to_string();
                is_descendant(&path, directory).then_some(ListedChild { path, kind })
            })
            .collect(),
        None => anchor_children(&document, page_url, endpoints, reference, directory),
    };

    let mut seen = HashSet::new();
    children
        .into_iter()
        .filter(|child| seen.insert(child.path.clone()))
        .collect()
}

fn anchor_children(
    document: &Html,
    page_url: &Url,
    endpoints: &Endpoints,
    reference: &RepositoryRef,
    directory: &str,
) -> Vec<ListedChild> {
    let mut children = Vec::new();

    for element in document.select(&ANCHORS) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }

        let Ok(link) = page_url.join(href) else {
            continue;
        };

        if let Some(child) = classify_link(&link, endpoints, reference)
            && is_descendant(&child.path, directory)
        {
            children.push(child);
        }
    }

    children
}

/// Interpret `link` as a `tree`/`blob` link into the target branch.
pub(crate) fn classify_link(
    link: &Url,
    endpoints: &Endpoints,
    reference: &RepositoryRef,
) -> Option<ListedChild> {
    if link.host_str()? != endpoints.web_base.host_str()? {
        return None;
    }

    let base_depth = endpoints
        .web_base
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0);
    let segments: Vec<&str> = link
        .path_segments()?
        .filter(|s| !s.is_empty())
        .skip(base_depth)
        .collect();

    let [owner, name, kind, rest @ ..] = segments.as_slice() else {
        return None;
    };
    if !owner.eq_ignore_ascii_case(&reference.owner) || !name.eq_ignore_ascii_case(&reference.name)
    {
        return None;
    }

    let kind = match *kind {
        "tree" => EntryKind::Directory,
        "blob" => EntryKind::File,
        _ => return None,
    };

    let branch: Vec<&str> = reference.branch_segments().collect();
    let path_segments = rest.strip_prefix(branch.as_slice())?;
    if path_segments.is_empty() {
        return None;
    }

    let decoded = path_segments
        .iter()
        .map(|segment| {
            percent_decode_str(segment)
                .decode_utf8()
                .ok()
                .map(|s| s.into_owned())
        })
        .collect::<Option<Vec<_>>>()?;

    Some(ListedChild {
        path: decoded.join("/"),
        kind,
    })
}

fn is_descendant(path: &str, directory: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    if directory.is_empty() {
        return true;
    }
    path.strip_prefix(directory)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}
