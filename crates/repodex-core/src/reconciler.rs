//! The reconciliation engine and its collaborators.

use std::sync::Arc;

use anyhow::Result;

use crate::catalog::Catalog;
use crate::config::ReconcileConfig;
use crate::locks::ChannelLocks;
use crate::parser::{CondaFilenameParser, FilenameParser};
use crate::reporter::{Reporter, TracingReporter};
use crate::store::{OpendalStore, PackageStore};

/// Tunables for every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Channels reconciled concurrently by batch passes. Minimum 1.
    pub parallel: usize,
    /// Write `noarch/repodata.json` for every reconciled channel.
    pub noarch_always: bool,
    /// Hash archives when they are first recorded.
    pub compute_sha256: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            parallel: 4,
            noarch_always: true,
            compute_sha256: true,
        }
    }
}

/// Reconciles a package store against a catalog.
///
/// Passes live in [`crate::sync`], [`crate::doorstep`] and
/// [`crate::validate`]. Cloning is cheap and clones share their channel
/// locks, so concurrent passes from clones still serialize per channel.
#[derive(Clone)]
pub struct Reconciler {
    pub(crate) store: Arc<dyn PackageStore>,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) parser: Arc<dyn FilenameParser>,
    pub(crate) reporter: Arc<dyn Reporter>,
    pub(crate) locks: ChannelLocks,
    pub(crate) options: ReconcileOptions,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("options", &self.options)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Engine with the conda filename grammar and a tracing reporter.
    pub fn new(store: Arc<dyn PackageStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            store,
            catalog,
            parser: Arc::new(CondaFilenameParser::default()),
            reporter: Arc::new(TracingReporter),
            locks: ChannelLocks::new(),
            options: ReconcileOptions::default(),
        }
    }

    /// Build the store, catalog and parser described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store backend or the catalog cannot be opened.
    pub fn from_config(config: &ReconcileConfig) -> Result<Self> {
        let store = Arc::new(OpendalStore::new(config.store.operator()?));
        let catalog = config.catalog.open()?;
        Ok(Self::new(store, catalog)
            .with_parser(Arc::new(
                CondaFilenameParser::default()
                    .allow_unknown_platforms(config.allow_unknown_platforms),
            ))
            .with_options(config.options()))
    }

    /// Replace the filename parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn FilenameParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the reporter that receives pass events.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the options; `parallel` is clamped to at least 1.
    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = ReconcileOptions {
            parallel: options.parallel.max(1),
            ..options
        };
        self
    }

    /// The package store.
    pub fn store(&self) -> &dyn PackageStore {
        self.store.as_ref()
    }

    /// The catalog.
    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// Options in effect.
    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Channel locks shared by every clone.
    pub fn locks(&self) -> &ChannelLocks {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::config::{CatalogConfig, StoreConfig};

    #[test]
    fn test_parallel_is_clamped() {
        let config = ReconcileConfig {
            store: StoreConfig::Memory,
            catalog: CatalogConfig::Memory,
            ..ReconcileConfig::default()
        };
        let reconciler = Reconciler::from_config(&config)
            .unwrap()
            .with_options(ReconcileOptions {
                parallel: 0,
                ..ReconcileOptions::default()
            });
        assert_eq!(reconciler.options().parallel, 1);
    }

    #[tokio::test]
    async fn test_clones_share_locks() {
        let store = Arc::new(OpendalStore::new(
            StoreConfig::Memory.operator().unwrap(),
        ));
        let reconciler = Reconciler::new(store, Arc::new(MemoryCatalog::new()));
        let clone = reconciler.clone();
        let _guard = reconciler.locks().lock("main").await;
        assert!(clone.locks().try_lock("main").is_none());
    }
}
