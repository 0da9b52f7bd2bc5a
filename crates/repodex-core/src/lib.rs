//! repodex core
//!
//! Keeps a package catalog (channels, packages, versions, ownership) in step
//! with the contents of an object store, and regenerates the per-subdirectory
//! `repodata.json` index from catalog state.
//!
//! # Architecture
//!
//! - **Collaborators as traits**: [`PackageStore`], [`Catalog`] and
//!   [`FilenameParser`] are injected into a [`Reconciler`], so every pass can
//!   run against in-memory fakes.
//! - **Actor pattern**: [`catalog::SqliteCatalog`] hosts its SQLite
//!   connection on a dedicated thread.
//! - **Per-channel locking**: at most one pass touches a channel at a time,
//!   while different channels reconcile in parallel ([`ChannelLocks`]).
//!
//! # Entry points
//!
//! [`Reconciler::reindex`], [`Reconciler::reindex_all`],
//! [`Reconciler::check_doorstep`] and [`Reconciler::validate`].

pub mod catalog;
pub mod config;
pub mod doorstep;
pub mod error;
pub mod index;
pub mod locks;
pub mod parser;
pub mod paths;
pub mod reconciler;
pub mod reporter;
pub mod scanner;
pub mod store;
pub mod sync;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use catalog::{Catalog, CatalogError, MemoryCatalog, SqliteCatalog};
pub use config::ReconcileConfig;
pub use doorstep::DoorstepOutcome;
pub use error::{BatchOutcome, ChannelFailure, ReconcileError};
pub use locks::ChannelLocks;
pub use parser::{CondaFilenameParser, FilenameParser};
pub use reconciler::{ReconcileOptions, Reconciler};
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use store::{OpendalStore, PackageStore, StoreError};
pub use validate::ValidationReport;
