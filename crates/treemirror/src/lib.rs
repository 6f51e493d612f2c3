//! Treemirror - mirror a remote repository's file tree to local disk.
//!
//! The remote is reached only over its HTTP surfaces: a structured tree API,
//! rendered HTML pages and a raw-content host. Discovery streams entries to a
//! bounded worker pool that extracts each file's text and writes it without
//! ever overwriting existing files.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use treemirror::gateway::{Gateway, GatewayOptions};
//! use treemirror::reference::{Endpoints, resolve};
//! use treemirror::sync::SyncContext;
//!
//! let gateway = Arc::new(Gateway::new(GatewayOptions::default())?);
//! gateway.establish(Endpoints::default().reachability_url().as_str()).await?;
//!
//! let reference = resolve("acme/widgets", None)?;
//! let ctx = SyncContext::builder().gateway(gateway).build()?;
//! let report = ctx.run(reference, "widgets".as_ref()).await?;
//! println!("{} files written", report.summary.files_written);
//! ```

pub mod discovery;
pub mod extract;
pub mod gateway;
pub mod http;
pub mod materialize;
mod payload;
pub mod reference;
pub mod stats;
pub mod sync;

pub use gateway::{Gateway, GatewayError, GatewayOptions};
pub use http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport, header_get};
pub use reference::{Endpoints, ReferenceError, RepositoryRef};
pub use stats::{RunSummary, format_size};
pub use sync::{SyncContext, SyncError, SyncOptions, SyncReport};
