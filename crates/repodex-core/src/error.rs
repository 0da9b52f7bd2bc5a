//! Errors for reconciliation passes

use repodex_schema::Channel;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::index::IndexError;
use crate::store::StoreError;

/// Why a pass over one channel failed.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("channel '{0}' does not exist in the package store")]
    ChannelNotFound(String),

    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A channel that failed inside a batch pass.
#[derive(Debug)]
pub struct ChannelFailure {
    /// Channel that failed.
    pub channel: String,
    /// What went wrong.
    pub error: ReconcileError,
}

/// Result of a pass over every channel in the store.
///
/// One channel's failure never aborts the others; `channels` holds the
/// successes in store-enumeration order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Channels reconciled successfully.
    pub channels: Vec<Channel>,
    /// Channels that failed, in store order.
    pub failures: Vec<ChannelFailure>,
    /// Channels not started because the batch was cancelled.
    pub cancelled: Vec<String>,
}

impl BatchOutcome {
    /// No failures and nothing cancelled.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cancelled.is_empty()
    }
}
