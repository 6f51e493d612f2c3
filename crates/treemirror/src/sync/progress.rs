//! Progress events emitted during a mirror run.

use crate::discovery::DiscoveryStrategy;
use crate::materialize::MaterializeOutcome;

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Discovery is starting for a reference.
    DiscoveryStarted {
        reference: String,
        strategy: DiscoveryStrategy,
    },

    /// The implicit default branch was missing; retrying with the fallback.
    BranchFallback { from: String, to: String },

    /// A file entry was handed to the worker pool.
    FileQueued { path: String },

    /// A file worker finished.
    FileCompleted {
        path: String,
        outcome: MaterializeOutcome,
    },

    /// Discovery finished.
    DiscoveryComplete {
        strategy: DiscoveryStrategy,
        entries: usize,
        directories_listed: usize,
        directory_errors: usize,
    },

    /// A shutdown request stopped dispatching.
    Interrupted,

    /// Warning message (non-fatal).
    Warning { message: String },

    /// The run finished.
    SyncComplete { files_written: usize, errors: usize },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn emit_with_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |event| {
            sink.lock().unwrap().push(format!("{event:?}"));
        });

        emit(
            Some(&callback),
            SyncProgress::FileQueued {
                path: "src/lib.rs".into(),
            },
        );
        emit(Some(&callback), SyncProgress::Interrupted);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains("src/lib.rs"));
    }

    #[test]
    fn emit_without_callback() {
        emit(None, SyncProgress::Interrupted);
    }
}
