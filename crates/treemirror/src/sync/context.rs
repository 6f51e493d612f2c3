//! Builder that bundles everything a mirror run needs.
//!
//! ```ignore
//! use treemirror::sync::{SyncContext, SyncOptions};
//!
//! let ctx = SyncContext::builder()
//!     .gateway(gateway)
//!     .options(SyncOptions::default())
//!     .progress(callback)
//!     .build()?;
//!
//! let report = ctx.run(reference, Path::new("widgets")).await?;
//! ```

use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use super::engine::sync_repository;
use super::progress::ProgressCallback;
use super::types::{SyncError, SyncOptions, SyncReport};
use crate::extract::Extractor;
use crate::gateway::Gateway;
use crate::reference::{Endpoints, RepositoryRef};

/// Error type for sync context operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncContextError {
    /// Missing required field in builder.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
}

#[derive(Default)]
pub struct SyncContextBuilder {
    gateway: Option<Arc<Gateway>>,
    endpoints: Option<Endpoints>,
    extractor: Option<Extractor>,
    options: Option<SyncOptions>,
    progress: Option<Arc<ProgressCallback>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl SyncContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the network gateway. Required.
    pub fn gateway(mut self, gateway: Arc<Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Override the remote base URLs.
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Replace the default extraction chain.
    pub fn extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Set the shutdown flag for graceful shutdown.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// # Errors
    ///
    /// Returns `SyncContextError::MissingField` when no gateway was set.
    pub fn build(self) -> Result<SyncContext, SyncContextError> {
        let gateway = self
            .gateway
            .ok_or(SyncContextError::MissingField { field: "gateway" })?;

        Ok(SyncContext {
            gateway,
            endpoints: Arc::new(self.endpoints.unwrap_or_default()),
            extractor: Arc::new(self.extractor.unwrap_or_default()),
            options: self.options.unwrap_or_default(),
            progress: self.progress,
            shutdown_flag: self.shutdown_flag,
        })
    }
}

/// Configured mirror run, reusable across references.
pub struct SyncContext {
    gateway: Arc<Gateway>,
    endpoints: Arc<Endpoints>,
    extractor: Arc<Extractor>,
    options: SyncOptions,
    progress: Option<Arc<ProgressCallback>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl SyncContext {
    pub fn builder() -> SyncContextBuilder {
        SyncContextBuilder::new()
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Mirror `reference` into `destination`.
    pub async fn run(
        &self,
        reference: RepositoryRef,
        destination: &Path,
    ) -> Result<SyncReport, SyncError> {
        sync_repository(
            Arc::clone(&self.gateway),
            Arc::clone(&self.endpoints),
            Arc::clone(&self.extractor),
            reference,
            destination,
            &self.options,
            self.shutdown_flag.clone(),
            self.progress.clone(),
        )
        .await
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }
}
