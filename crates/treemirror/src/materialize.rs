//! Writing extracted content to the local tree.
//!
//! Files are written through a temporary file in the destination directory
//! and moved into place without clobbering, so a partially written file is
//! never visible and an existing file is never replaced.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::discovery::TreeEntry;
use crate::extract::ExtractionResult;
use crate::stats::RunStatistics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Written { bytes: u64 },
    SkippedExisting,
    SkippedBinary,
    /// A zero-length file was written.
    SkippedEmpty,
    Error(String),
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("unsafe destination path '{0}'")]
    UnsafePath(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MaterializeError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Join a remote relative path onto `root`, refusing anything that could
/// escape it.
pub fn destination_path(root: &Path, relative: &str) -> Result<PathBuf, MaterializeError> {
    let mut destination = root.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                destination.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(MaterializeError::UnsafePath(relative.to_string()));
            }
        }
    }

    if depth == 0 {
        return Err(MaterializeError::UnsafePath(relative.to_string()));
    }
    Ok(destination)
}

/// Whether something already occupies the destination of `relative`.
pub fn already_present(root: &Path, relative: &str) -> bool {
    destination_path(root, relative)
        .map(|path| path.symlink_metadata().is_ok())
        .unwrap_or(false)
}

/// Create the directory for a directory entry, counting each new level.
pub fn ensure_directory(
    root: &Path,
    relative: &str,
    stats: &RunStatistics,
) -> Result<(), MaterializeError> {
    let target = destination_path(root, relative)?;
    create_levels(root, &target, stats)
}

fn create_levels(
    root: &Path,
    target: &Path,
    stats: &RunStatistics,
) -> Result<(), MaterializeError> {
    fs::create_dir_all(root).map_err(|e| MaterializeError::io(root, e))?;

    let Ok(relative) = target.strip_prefix(root) else {
        return Err(MaterializeError::UnsafePath(target.display().to_string()));
    };

    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::create_dir(&current) {
            Ok(()) => {
                debug!(path = %current.display(), "created directory");
                stats.record_directory_created();
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && current.is_dir() => {}
            Err(e) => return Err(MaterializeError::io(&current, e)),
        }
    }
    Ok(())
}

/// Write `contents` to `destination` unless something is already there.
///
/// Returns `false` when the destination appeared before the move.
fn write_new(destination: &Path, contents: &[u8]) -> Result<bool, MaterializeError> {
    let parent = destination
        .parent()
        .ok_or_else(|| MaterializeError::UnsafePath(destination.display().to_string()))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| MaterializeError::io(parent, e))?;
    temp.write_all(contents)
        .and_then(|()| temp.flush())
        .map_err(|e| MaterializeError::io(temp.path(), e))?;

    match temp.persist_noclobber(destination) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(MaterializeError::io(destination, e.error)),
    }
}

/// Apply one extraction result to the local tree and record the outcome.
pub fn materialize(
    entry: &TreeEntry,
    result: ExtractionResult,
    root: &Path,
    stats: &RunStatistics,
) -> MaterializeOutcome {
    match try_materialize(entry, result, root, stats) {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = e.to_string();
            stats.record_error(format!("{}: {message}", entry.path));
            MaterializeOutcome::Error(message)
        }
    }
}

fn try_materialize(
    entry: &TreeEntry,
    result: ExtractionResult,
    root: &Path,
    stats: &RunStatistics,
) -> Result<MaterializeOutcome, MaterializeError> {
    let destination = destination_path(root, &entry.path)?;

    let contents = match result {
        ExtractionResult::Binary => {
            stats.record_skipped_binary();
            return Ok(MaterializeOutcome::SkippedBinary);
        }
        ExtractionResult::Failed(reason) => {
            stats.record_error(format!("{}: {reason}", entry.path));
            return Ok(MaterializeOutcome::Error(reason));
        }
        ExtractionResult::Text(bytes) => bytes,
        ExtractionResult::Empty => Vec::new(),
    };

    if destination.symlink_metadata().is_ok() {
        stats.record_skipped_existing();
        return Ok(MaterializeOutcome::SkippedExisting);
    }

    if let Some(parent) = destination.parent() {
        create_levels(root, parent, stats)?;
    }

    if !write_new(&destination, &contents)? {
        stats.record_skipped_existing();
        return Ok(MaterializeOutcome::SkippedExisting);
    }

    if contents.is_empty() {
        stats.record_empty();
        Ok(MaterializeOutcome::SkippedEmpty)
    } else {
        let bytes = contents.len() as u64;
        stats.record_written(bytes);
        Ok(MaterializeOutcome::Written { bytes })
    }
}
