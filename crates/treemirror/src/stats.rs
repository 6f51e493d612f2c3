//! Run-wide counters shared by every worker.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RunStatistics {
    files_written: AtomicUsize,
    directories_created: AtomicUsize,
    files_skipped_binary: AtomicUsize,
    files_skipped_existing: AtomicUsize,
    files_empty: AtomicUsize,
    errors: AtomicUsize,
    total_bytes: AtomicU64,
    error_messages: Mutex<Vec<String>>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&self, bytes: u64) {
        self.files_written.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// A zero-length file was written.
    pub fn record_empty(&self) {
        self.files_written.fetch_add(1, Ordering::Relaxed);
        self.files_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_directory_created(&self) {
        self.directories_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_binary(&self) {
        self.files_skipped_binary.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_existing(&self) {
        self.files_skipped_existing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.error_messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.into());
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            files_written: self.files_written.load(Ordering::Relaxed),
            directories_created: self.directories_created.load(Ordering::Relaxed),
            files_skipped_binary: self.files_skipped_binary.load(Ordering::Relaxed),
            files_skipped_existing: self.files_skipped_existing.load(Ordering::Relaxed),
            files_empty: self.files_empty.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            error_messages: self
                .error_messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

/// Plain copy of [`RunStatistics`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_written: usize,
    pub directories_created: usize,
    pub files_skipped_binary: usize,
    pub files_skipped_existing: usize,
    pub files_empty: usize,
    pub errors: usize,
    pub total_bytes: u64,
    pub error_messages: Vec<String>,
}

impl RunSummary {
    pub fn total_size(&self) -> String {
        format_size(self.total_bytes)
    }
}

/// Human-readable size with two decimals, e.g. `1.50 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn format_size_walks_units() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024 * 1024), "2.00 TB");
    }

    #[test]
    fn empty_files_count_as_written() {
        let stats = RunStatistics::new();
        stats.record_written(10);
        stats.record_empty();
        stats.record_skipped_binary();

        let summary = stats.snapshot();
        assert_eq!(summary.files_written, 2);
        assert_eq!(summary.files_empty, 1);
        assert_eq!(summary.files_skipped_binary, 1);
        assert_eq!(summary.total_bytes, 10);
        assert_eq!(summary.total_size(), "10.00 B");
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let stats = Arc::new(RunStatistics::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_written(1);
                    }
                    stats.record_error(format!("worker {i} failed once"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = stats.snapshot();
        assert_eq!(summary.files_written, 800);
        assert_eq!(summary.total_bytes, 800);
        assert_eq!(summary.errors, 8);
        assert_eq!(summary.error_messages.len(), 8);
    }

    #[test]
    fn summary_serializes_to_json() {
        let stats = RunStatistics::new();
        stats.record_directory_created();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["directories_created"], 1);
        assert_eq!(json["errors"], 0);
    }
}
