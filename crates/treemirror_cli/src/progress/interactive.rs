use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use treemirror::materialize::MaterializeOutcome;
use treemirror::sync::SyncProgress;

#[derive(Default)]
struct ProgressState {
    /// Spinner counting discovered files.
    discover_bar: Option<ProgressBar>,
    /// Bar whose length grows as files are queued.
    files_bar: Option<ProgressBar>,
    discovered: usize,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn files_bar(&self, state: &mut ProgressState) -> ProgressBar {
        if let Some(ref pb) = state.files_bar {
            return pb.clone();
        }

        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(Self::bar_style());
        pb.set_prefix(format!("{:10}", "files"));
        state.files_bar = Some(pb.clone());
        pb
    }

    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncProgress::DiscoveryStarted {
                reference,
                strategy,
            } => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.set_prefix(format!("{:10}", "discover"));
                pb.set_message(format!("Listing {reference} ({strategy})..."));
                pb.enable_steady_tick(Duration::from_millis(100));
                state.discover_bar = Some(pb);
            }

            SyncProgress::BranchFallback { from, to } => {
                if let Some(ref pb) = state.discover_bar {
                    pb.set_message(format!("Branch '{from}' not found, trying '{to}'..."));
                }
            }

            SyncProgress::FileQueued { .. } => {
                state.discovered += 1;
                if let Some(ref pb) = state.discover_bar {
                    pb.set_message(format!("{} files found...", state.discovered));
                }
                self.files_bar(&mut state).inc_length(1);
            }

            SyncProgress::FileCompleted { path, outcome } => {
                let pb = self.files_bar(&mut state);
                pb.inc(1);
                match outcome {
                    MaterializeOutcome::Error(error) => {
                        self.multi.println(format!("✗ {path}: {error}")).ok();
                    }
                    MaterializeOutcome::SkippedBinary => {
                        pb.set_message(format!("skipped binary {path}"));
                    }
                    _ => pb.set_message(path),
                }
            }

            SyncProgress::DiscoveryComplete {
                entries,
                directories_listed,
                directory_errors,
                ..
            } => {
                if let Some(ref pb) = state.discover_bar {
                    let mut msg = format!(
                        "✓ {entries} entries from {directories_listed} listing{}",
                        if directories_listed == 1 { "" } else { "s" }
                    );
                    if directory_errors > 0 {
                        msg.push_str(&format!(" ({directory_errors} unreadable)"));
                    }
                    pb.finish_with_message(msg);
                }
            }

            SyncProgress::Interrupted => {
                if let Some(ref pb) = state.files_bar {
                    pb.set_message("interrupted, finishing files in flight...");
                }
            }

            SyncProgress::Warning { message } => {
                self.multi.println(format!("⚠ {message}")).ok();
            }

            SyncProgress::SyncComplete {
                files_written,
                errors,
            } => {
                if let Some(ref pb) = state.files_bar {
                    pb.finish_with_message(format!("✓ {files_written} written, {errors} errors"));
                }
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ref pb) = state.discover_bar
            && !pb.is_finished()
        {
            pb.finish();
        }
        if let Some(ref pb) = state.files_bar
            && !pb.is_finished()
        {
            pb.finish();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>4}/{len:4} {wide_msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_bar_grows_with_queue_and_tracks_completions() {
        let reporter = InteractiveReporter::new();
        reporter.handle(SyncProgress::FileQueued { path: "a".into() });
        reporter.handle(SyncProgress::FileQueued { path: "b".into() });
        reporter.handle(SyncProgress::FileCompleted {
            path: "a".into(),
            outcome: MaterializeOutcome::Written { bytes: 3 },
        });

        let state = reporter.state.lock().unwrap();
        let bar = state.files_bar.as_ref().unwrap();
        assert_eq!(bar.length(), Some(2));
        assert_eq!(bar.position(), 1);
        assert_eq!(state.discovered, 2);
    }

    #[test]
    fn finish_is_safe_without_events() {
        InteractiveReporter::new().finish();
    }
}
