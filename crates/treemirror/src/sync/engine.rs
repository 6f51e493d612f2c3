//! The mirror run: discovery feeding a bounded pool of file workers.
//!
//! Discovery runs in its own task and streams entries through a bounded
//! channel. The consumer creates directories inline and hands every file to a
//! worker once a semaphore permit is free, so pool size is the only
//! backpressure. Worker failures of any kind are counted and never abort the
//! run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{ENTRY_CHANNEL_BUFFER_SIZE, SyncError, SyncOptions, SyncReport};
use crate::discovery::{
    DiscoveryError, DiscoveryOutcome, DiscoveryStrategy, EntryKind, TreeEntry, VisitedSet,
    discover,
};
use crate::extract::{ExtractionResult, Extractor};
use crate::gateway::Gateway;
use crate::materialize::{MaterializeOutcome, already_present, ensure_directory, materialize};
use crate::reference::{Endpoints, RepositoryRef};
use crate::stats::RunStatistics;

/// Mirror `reference` into `destination`.
///
/// # Arguments
///
/// * `gateway` - Established network gateway shared by every request
/// * `endpoints` - Base URLs of the remote surfaces
/// * `extractor` - Strategy chain for rendered file pages
/// * `reference` - Repository to mirror; its branch may fall back once
/// * `destination` - Local root directory
/// * `options` - Concurrency, strategy and dry-run settings
/// * `shutdown` - Optional flag that stops dispatching new work when set
/// * `on_progress` - Optional progress callback
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(
    skip_all,
    fields(
        reference = %reference,
        destination = %destination.display(),
        concurrency = options.concurrency
    )
)]
pub async fn sync_repository(
    gateway: Arc<Gateway>,
    endpoints: Arc<Endpoints>,
    extractor: Arc<Extractor>,
    reference: RepositoryRef,
    destination: &Path,
    options: &SyncOptions,
    shutdown: Option<Arc<AtomicBool>>,
    on_progress: Option<Arc<ProgressCallback>>,
) -> Result<SyncReport, SyncError> {
    let started = Instant::now();
    let progress = on_progress.as_deref();
    let stats = Arc::new(RunStatistics::new());
    let root = destination.to_path_buf();

    if shutdown_requested(shutdown.as_ref()) {
        info!("shutdown requested before discovery; nothing mirrored");
        emit(progress, SyncProgress::Interrupted);
        return Ok(SyncReport {
            reference,
            strategy: options.strategy,
            summary: stats.snapshot(),
            directories_listed: 0,
            entries_discovered: 0,
            directory_errors: Vec::new(),
            truncated: false,
            elapsed: started.elapsed(),
            interrupted: true,
            exclusive_session: gateway.is_exclusive(),
            dry_run: options.dry_run,
        });
    }

    if !options.dry_run {
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| SyncError::Destination {
                path: root.clone(),
                source,
            })?;
    }

    emit(
        progress,
        SyncProgress::DiscoveryStarted {
            reference: reference.to_string(),
            strategy: options.strategy,
        },
    );

    let (tx, mut rx) = mpsc::channel::<TreeEntry>(ENTRY_CHANNEL_BUFFER_SIZE);
    let discovery = tokio::spawn(discover_with_branch_fallback(
        Arc::clone(&gateway),
        Arc::clone(&endpoints),
        reference,
        options.strategy,
        tx,
        on_progress.clone(),
    ));

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut workers: JoinSet<()> = JoinSet::new();
    let mut interrupted = false;

    while let Some(entry) = rx.recv().await {
        if shutdown_requested(shutdown.as_ref()) {
            interrupted = true;
            break;
        }

        match entry.kind {
            EntryKind::Directory => {
                if options.dry_run {
                    continue;
                }
                if let Err(e) = ensure_directory(&root, &entry.path, &stats) {
                    warn!(path = %entry.path, error = %e, "failed to create directory");
                    stats.record_error(format!("{}: {e}", entry.path));
                }
            }
            EntryKind::File => {
                emit(
                    progress,
                    SyncProgress::FileQueued {
                        path: entry.path.clone(),
                    },
                );
                if options.dry_run {
                    continue;
                }

                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    error!("worker pool closed unexpectedly");
                    break;
                };
                workers.spawn(process_file(
                    FileJob {
                        gateway: Arc::clone(&gateway),
                        extractor: Arc::clone(&extractor),
                        stats: Arc::clone(&stats),
                        root: root.clone(),
                        on_progress: on_progress.clone(),
                        entry,
                    },
                    permit,
                ));
            }
        }

        while let Some(joined) = workers.try_join_next() {
            record_worker_result(joined, &stats);
        }
    }

    // Closing the receiver stops discovery at its next send.
    drop(rx);

    if interrupted {
        warn!("shutdown requested; waiting for in-flight files");
        emit(progress, SyncProgress::Interrupted);
    }

    let discovered = discovery.await;

    while let Some(joined) = workers.join_next().await {
        record_worker_result(joined, &stats);
    }

    let (resolved, outcome) = match discovered {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => return Err(e.into()),
        Err(e) => return Err(SyncError::TaskPanic(panic_message(e))),
    };

    for message in &outcome.stats.directory_errors {
        stats.record_error(format!("listing {message}"));
    }
    if outcome.stats.truncated {
        emit(
            progress,
            SyncProgress::Warning {
                message: "tree listing truncated by the remote; mirroring listed entries only"
                    .to_string(),
            },
        );
    }
    if options.strategy == DiscoveryStrategy::Auto && outcome.strategy == DiscoveryStrategy::Scrape
    {
        emit(
            progress,
            SyncProgress::Warning {
                message: "structured listing unavailable; mirrored from rendered pages".to_string(),
            },
        );
    }

    emit(
        progress,
        SyncProgress::DiscoveryComplete {
            strategy: outcome.strategy,
            entries: outcome.stats.entries,
            directories_listed: outcome.stats.directories_listed,
            directory_errors: outcome.stats.directory_errors.len(),
        },
    );

    let summary = stats.snapshot();
    info!(
        reference = %resolved,
        strategy = %outcome.strategy,
        files_written = summary.files_written,
        directories_created = summary.directories_created,
        skipped_binary = summary.files_skipped_binary,
        skipped_existing = summary.files_skipped_existing,
        errors = summary.errors,
        interrupted,
        "mirror finished"
    );
    emit(
        progress,
        SyncProgress::SyncComplete {
            files_written: summary.files_written,
            errors: summary.errors,
        },
    );

    Ok(SyncReport {
        reference: resolved,
        strategy: outcome.strategy,
        summary,
        directories_listed: outcome.stats.directories_listed,
        entries_discovered: outcome.stats.entries,
        directory_errors: outcome.stats.directory_errors,
        truncated: outcome.stats.truncated,
        elapsed: started.elapsed(),
        interrupted,
        exclusive_session: gateway.is_exclusive(),
        dry_run: options.dry_run,
    })
}

/// Run discovery, substituting the fallback branch once on `NotFound`.
async fn discover_with_branch_fallback(
    gateway: Arc<Gateway>,
    endpoints: Arc<Endpoints>,
    reference: RepositoryRef,
    strategy: DiscoveryStrategy,
    tx: mpsc::Sender<TreeEntry>,
    on_progress: Option<Arc<ProgressCallback>>,
) -> Result<(RepositoryRef, DiscoveryOutcome), DiscoveryError> {
    let mut visited = VisitedSet::new();
    match discover(&gateway, &endpoints, &reference, strategy, &mut visited, &tx).await {
        Err(e) if e.is_not_found() => {
            let Some(fallback) = reference.fallback() else {
                return Err(e);
            };

            info!(
                from = %reference.branch,
                to = %fallback.branch,
                "branch not found; retrying with fallback branch"
            );
            emit(
                on_progress.as_deref(),
                SyncProgress::BranchFallback {
                    from: reference.branch.clone(),
                    to: fallback.branch.clone(),
                },
            );

            let mut visited = VisitedSet::new();
            let outcome =
                discover(&gateway, &endpoints, &fallback, strategy, &mut visited, &tx).await?;
            Ok((fallback, outcome))
        }
        result => result.map(|outcome| (reference, outcome)),
    }
}

struct FileJob {
    gateway: Arc<Gateway>,
    extractor: Arc<Extractor>,
    stats: Arc<RunStatistics>,
    root: PathBuf,
    on_progress: Option<Arc<ProgressCallback>>,
    entry: TreeEntry,
}

async fn process_file(job: FileJob, _permit: OwnedSemaphorePermit) {
    let FileJob {
        gateway,
        extractor,
        stats,
        root,
        on_progress,
        entry,
    } = job;
    let path = entry.path.clone();

    let outcome = if already_present(&root, &entry.path) {
        debug!(path = %path, "already present; not fetching");
        stats.record_skipped_existing();
        MaterializeOutcome::SkippedExisting
    } else {
        let result = extractor.extract(&gateway, &entry).await;
        if let ExtractionResult::Failed(reason) = &result {
            warn!(path = %path, error = %reason, "failed to fetch file");
        }

        let writer_stats = Arc::clone(&stats);
        let written =
            tokio::task::spawn_blocking(move || materialize(&entry, result, &root, &writer_stats))
                .await;
        match written {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = panic_message(e);
                stats.record_error(format!("{path}: {message}"));
                MaterializeOutcome::Error(message)
            }
        }
    };

    debug!(path = %path, outcome = ?outcome, "file finished");
    emit(
        on_progress.as_deref(),
        SyncProgress::FileCompleted { path, outcome },
    );
}

fn record_worker_result(joined: Result<(), JoinError>, stats: &RunStatistics) {
    if let Err(e) = joined {
        let message = panic_message(e);
        error!(error = %message, "file worker failed");
        stats.record_error(format!("worker: {message}"));
    }
}

fn panic_message(e: JoinError) -> String {
    if e.is_panic() {
        let payload = e.into_panic();
        if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        }
    } else if e.is_cancelled() {
        "Task was cancelled".to_string()
    } else {
        format!("Task failed: {e}")
    }
}

fn shutdown_requested(flag: Option<&Arc<AtomicBool>>) -> bool {
    flag.is_some_and(|flag| flag.load(Ordering::SeqCst))
}
