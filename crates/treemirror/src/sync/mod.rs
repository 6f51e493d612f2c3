//! Orchestration of a mirror run.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncOptions`, `SyncReport`, `SyncError` and constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - The run itself: `sync_repository()`
//! - [`context`] - `SyncContext` builder wrapping the engine

mod context;
pub mod engine;
mod progress;
mod types;

pub use context::{SyncContext, SyncContextBuilder, SyncContextError};
pub use engine::sync_repository;
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use types::{
    DEFAULT_CONCURRENCY, ENTRY_CHANNEL_BUFFER_SIZE, MAX_PROXY_ATTEMPTS, SyncError, SyncOptions,
    SyncReport,
};
