//! Repository references and the endpoints they map to.
//!
//! A reference names `owner/name` plus a branch. It is resolved once from user
//! input and only ever re-resolved through [`RepositoryRef::fallback`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Branch used when the caller does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Conventional branch tried once when [`DEFAULT_BRANCH`] does not exist.
pub const FALLBACK_BRANCH: &str = "master";

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_WEB_BASE: &str = "https://github.com";

/// Errors produced while resolving a repository reference.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("repository reference is empty")]
    Empty,

    #[error("invalid repository URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("repository reference '{0}' must name both an owner and a repository")]
    MissingSegments(String),

    #[error("invalid endpoint base '{input}': {reason}")]
    InvalidEndpoint { input: String, reason: String },
}

/// An `owner/name@branch` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
    pub branch: String,
    /// True when the branch came from the caller rather than the default.
    pub branch_explicit: bool,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: DEFAULT_BRANCH.to_string(),
            branch_explicit: false,
        }
    }

    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self.branch_explicit = true;
        self
    }

    /// The alternate reference to try after the implicit default branch was not found.
    ///
    /// Returns `None` for explicit branches and for references that already
    /// fell back, so the substitution happens at most once.
    #[must_use]
    pub fn fallback(&self) -> Option<Self> {
        if self.branch_explicit || self.branch != DEFAULT_BRANCH {
            return None;
        }
        Some(Self {
            branch: FALLBACK_BRANCH.to_string(),
            ..self.clone()
        })
    }

    pub(crate) fn branch_segments(&self) -> impl Iterator<Item = &str> {
        self.branch.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}

/// Resolve user input into a [`RepositoryRef`].
///
/// Accepts full URLs (`https://host/owner/name[.git][/tree/branch]`), scp-style
/// remotes (`git@host:owner/name.git`) and `owner/name` shorthand. An explicit
/// branch argument wins over one embedded in the URL.
///
/// Everything after `/tree/` is the branch, so `tree/release/1.x` names the
/// branch `release/1.x`. A `/blob/` URL points at a file; only its first
/// segment after `blob` is taken as the branch.
pub fn resolve(raw: &str, explicit_branch: Option<&str>) -> Result<RepositoryRef, ReferenceError> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ReferenceError::Empty);
    }

    let segments = path_segments(input)?;
    if segments.len() < 2 {
        return Err(ReferenceError::MissingSegments(input.to_string()));
    }

    let owner = segments[0].clone();
    let name = segments[1]
        .strip_suffix(".git")
        .unwrap_or(&segments[1])
        .to_string();
    if name.is_empty() {
        return Err(ReferenceError::MissingSegments(input.to_string()));
    }

    let mut reference = RepositoryRef::new(owner, name);

    let url_branch = match segments.get(2).map(String::as_str) {
        Some("tree") if segments.len() > 3 => Some(segments[3..].join("/")),
        Some("blob") => segments.get(3).cloned(),
        _ => None,
    };

    let explicit = explicit_branch
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .or(url_branch);
    if let Some(branch) = explicit {
        reference = reference.with_branch(branch);
    }

    Ok(reference)
}

fn path_segments(input: &str) -> Result<Vec<String>, ReferenceError> {
    let path = if input.contains("://") {
        let url = Url::parse(input).map_err(|e| ReferenceError::InvalidUrl {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        url.path().to_string()
    } else if let Some((host, path)) = input.split_once(':')
        && host.contains('@')
    {
        path.to_string()
    } else {
        // `github.com/owner/name` without a scheme: drop the host segment.
        match input.split_once('/') {
            Some((first, rest)) if first.contains('.') => rest.to_string(),
            _ => input.to_string(),
        }
    };

    Ok(path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Base URLs of the three remote surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Structured discovery surface.
    pub api_base: Url,
    /// Raw file content surface.
    pub raw_base: Url,
    /// Rendered HTML surface.
    pub web_base: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, DEFAULT_RAW_BASE, DEFAULT_WEB_BASE)
            .unwrap_or_else(|e| unreachable!("built-in endpoints are valid: {e}"))
    }
}

impl Endpoints {
    pub fn new(api_base: &str, raw_base: &str, web_base: &str) -> Result<Self, ReferenceError> {
        Ok(Self {
            api_base: parse_base(api_base)?,
            raw_base: parse_base(raw_base)?,
            web_base: parse_base(web_base)?,
        })
    }

    /// Structured endpoint returning the whole flattened tree for a branch.
    #[must_use]
    pub fn tree_api_url(&self, reference: &RepositoryRef) -> Url {
        let mut url = extend(
            &self.api_base,
            ["repos", reference.owner.as_str(), reference.name.as_str(), "git", "trees"]
                .into_iter()
                .chain(reference.branch_segments()),
        );
        url.set_query(Some("recursive=1"));
        url
    }

    /// Raw-content URL of a file.
    #[must_use]
    pub fn raw_url(&self, reference: &RepositoryRef, path: &str) -> Url {
        extend(
            &self.raw_base,
            [reference.owner.as_str(), reference.name.as_str()]
                .into_iter()
                .chain(reference.branch_segments())
                .chain(path_parts(path)),
        )
    }

    /// Rendered listing page of a directory; an empty path is the repository root.
    #[must_use]
    pub fn directory_url(&self, reference: &RepositoryRef, path: &str) -> Url {
        self.rendered(reference, "tree", path)
    }

    /// Rendered page of a single file.
    #[must_use]
    pub fn file_url(&self, reference: &RepositoryRef, path: &str) -> Url {
        self.rendered(reference, "blob", path)
    }

    /// URL used to check that the rendered surface is reachable at all.
    #[must_use]
    pub fn reachability_url(&self) -> Url {
        self.web_base.clone()
    }

    fn rendered(&self, reference: &RepositoryRef, kind: &str, path: &str) -> Url {
        extend(
            &self.web_base,
            [reference.owner.as_str(), reference.name.as_str(), kind]
                .into_iter()
                .chain(reference.branch_segments())
                .chain(path_parts(path)),
        )
    }
}

fn parse_base(input: &str) -> Result<Url, ReferenceError> {
    let url = Url::parse(input.trim_end_matches('/')).map_err(|e| {
        ReferenceError::InvalidEndpoint {
            input: input.to_string(),
            reason: e.to_string(),
        }
    })?;
    if url.cannot_be_a_base() {
        return Err(ReferenceError::InvalidEndpoint {
            input: input.to_string(),
            reason: "not a hierarchical URL".to_string(),
        });
    }
    Ok(url)
}

fn path_parts(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn extend<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut parts) = url.path_segments_mut() {
        parts.pop_if_empty();
        parts.extend(segments);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_full_url_with_git_suffix() {
        let reference = resolve("https://github.com/acme/widgets.git", None).unwrap();

        assert_eq!(reference.owner, "acme");
        assert_eq!(reference.name, "widgets");
        assert_eq!(reference.branch, DEFAULT_BRANCH);
        assert!(!reference.branch_explicit);
    }

    #[test]
    fn resolve_shorthand_and_scheme_less_forms() {
        let short = resolve("acme/widgets", None).unwrap();
        let hosted = resolve("github.com/acme/widgets/", None).unwrap();
        let scp = resolve("git@github.com:acme/widgets.git", None).unwrap();

        assert_eq!(short, hosted);
        assert_eq!(short, scp);
    }

    #[test]
    fn resolve_rejects_missing_segments() {
        assert_eq!(resolve("   ", None), Err(ReferenceError::Empty));
        assert!(matches!(
            resolve("https://github.com/acme", None),
            Err(ReferenceError::MissingSegments(_))
        ));
        assert!(matches!(
            resolve("acme/.git", None),
            Err(ReferenceError::MissingSegments(_))
        ));
        assert!(matches!(
            resolve("https://[broken/acme/widgets", None),
            Err(ReferenceError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn resolve_reads_branch_from_tree_url_and_prefers_explicit_argument() {
        let from_url = resolve("https://github.com/acme/widgets/tree/develop", None).unwrap();
        assert_eq!(from_url.branch, "develop");
        assert!(from_url.branch_explicit);

        let overridden =
            resolve("https://github.com/acme/widgets/tree/develop", Some("release")).unwrap();
        assert_eq!(overridden.branch, "release");

        let slashed =
            resolve("https://github.com/acme/widgets/tree/release/1.x", None).unwrap();
        assert_eq!(slashed.branch, "release/1.x");
        assert!(slashed.branch_explicit);
        assert!(slashed.fallback().is_none());

        let from_blob =
            resolve("https://github.com/acme/widgets/blob/develop/src/lib.rs", None).unwrap();
        assert_eq!(from_blob.branch, "develop");

        let blank = resolve("acme/widgets", Some("  ")).unwrap();
        assert_eq!(blank.branch, DEFAULT_BRANCH);
        assert!(!blank.branch_explicit);
    }

    #[test]
    fn fallback_happens_once_and_only_for_implicit_default() {
        let implicit = RepositoryRef::new("acme", "widgets");
        let fallen = implicit.fallback().expect("implicit main falls back");
        assert_eq!(fallen.branch, FALLBACK_BRANCH);
        assert!(fallen.fallback().is_none());

        let explicit = RepositoryRef::new("acme", "widgets").with_branch("main");
        assert!(explicit.fallback().is_none());
    }

    #[test]
    fn endpoints_map_reference_consistently() {
        let endpoints = Endpoints::default();
        let reference = RepositoryRef::new("acme", "widgets");

        assert_eq!(
            endpoints.tree_api_url(&reference).as_str(),
            "https://api.github.com/repos/acme/widgets/git/trees/main?recursive=1"
        );
        assert_eq!(
            endpoints.raw_url(&reference, "src/a.txt").as_str(),
            "https://raw.githubusercontent.com/acme/widgets/main/src/a.txt"
        );
        assert_eq!(
            endpoints.directory_url(&reference, "").as_str(),
            "https://github.com/acme/widgets/tree/main"
        );
        assert_eq!(
            endpoints.file_url(&reference, "docs/read me.md").as_str(),
            "https://github.com/acme/widgets/blob/main/docs/read%20me.md"
        );
    }

    #[test]
    fn endpoints_accept_custom_bases_with_paths() {
        let endpoints = Endpoints::new(
            "https://git.example.test/api/v3/",
            "https://git.example.test/raw",
            "https://git.example.test",
        )
        .unwrap();
        let reference = RepositoryRef::new("acme", "widgets").with_branch("feature/x");

        assert_eq!(
            endpoints.tree_api_url(&reference).as_str(),
            "https://git.example.test/api/v3/repos/acme/widgets/git/trees/feature/x?recursive=1"
        );
        assert_eq!(
            endpoints.directory_url(&reference, "src").as_str(),
            "https://git.example.test/acme/widgets/tree/feature/x/src"
        );
    }

    #[test]
    fn endpoints_reject_non_hierarchical_bases() {
        assert!(matches!(
            Endpoints::new("mailto:me@example.com", DEFAULT_RAW_BASE, DEFAULT_WEB_BASE),
            Err(ReferenceError::InvalidEndpoint { .. })
        ));
    }
}
