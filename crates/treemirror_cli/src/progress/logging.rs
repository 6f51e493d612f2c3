use treemirror::materialize::MaterializeOutcome;
use treemirror::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::DiscoveryStarted {
                reference,
                strategy,
            } => {
                tracing::info!(reference = %reference, strategy = %strategy, "Discovering tree");
            }

            SyncProgress::BranchFallback { from, to } => {
                tracing::info!(from = %from, to = %to, "Branch not found, trying fallback");
            }

            SyncProgress::FileQueued { path } => {
                tracing::debug!(path = %path, "Queued");
            }

            SyncProgress::FileCompleted { path, outcome } => match outcome {
                MaterializeOutcome::Written { bytes } => {
                    tracing::debug!(path = %path, bytes, "Written");
                }
                MaterializeOutcome::SkippedEmpty => {
                    tracing::debug!(path = %path, "Written (empty)");
                }
                MaterializeOutcome::SkippedExisting => {
                    tracing::debug!(path = %path, "Already present");
                }
                MaterializeOutcome::SkippedBinary => {
                    tracing::info!(path = %path, "Skipped binary file");
                }
                MaterializeOutcome::Error(error) => {
                    tracing::warn!(path = %path, error = %error, "Failed");
                }
            },

            SyncProgress::DiscoveryComplete {
                strategy,
                entries,
                directories_listed,
                directory_errors,
            } => {
                tracing::info!(
                    strategy = %strategy,
                    entries,
                    directories_listed,
                    directory_errors,
                    "Discovery complete"
                );
            }

            SyncProgress::Interrupted => {
                tracing::warn!("Interrupted, no new files will be started");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            SyncProgress::SyncComplete {
                files_written,
                errors,
            } => {
                tracing::info!(files_written, errors, "Mirror complete");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
