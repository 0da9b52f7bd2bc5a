//! Reporter trait for dependency injection
//!
//! Passes report what they skipped, created and evicted through this trait
//! instead of printing, so the CLI, a server or a test can each decide what
//! to surface.

use std::fmt;

use repodex_schema::{Package, PackageVersion, Platform};

use crate::error::ReconcileError;
use crate::scanner::SkippedObject;

/// Kind of reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Reindex,
    Doorstep,
    Validate,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reindex => "reindex",
            Self::Doorstep => "doorstep",
            Self::Validate => "validate",
        })
    }
}

/// Why the validator evicted a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The backing object no longer exists.
    Missing,
    /// The backing object exists with a different size.
    SizeMismatch { recorded: u64, actual: u64 },
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "backing object missing"),
            Self::SizeMismatch { recorded, actual } => {
                write!(f, "size mismatch (recorded {recorded}, live {actual})")
            }
        }
    }
}

pub trait Reporter: Send + Sync {
    /// A pass acquired the lock for `channel` and started.
    fn pass_started(&self, pass: Pass, channel: &str);

    /// A store object could not be parsed and was left out of the catalog.
    fn object_skipped(&self, channel: &str, skipped: &SkippedObject);

    /// A package row was created on first discovery.
    fn package_created(&self, package: &Package);

    /// The validator deleted a version row.
    fn version_evicted(&self, version: &PackageVersion, reason: EvictionReason);

    /// Two versions in one subdirectory claim the same filename; `dropped`
    /// was left out of the index in favour of the older row.
    fn filename_shadowed(&self, channel: &str, dropped: &PackageVersion);

    /// An index artifact was rewritten.
    fn index_written(&self, channel: &str, platform: &Platform, entries: usize);

    /// A channel failed inside a batch pass and was skipped.
    fn channel_failed(&self, pass: Pass, channel: &str, error: &ReconcileError);

    /// A pass released the lock for `channel`.
    fn pass_finished(&self, pass: Pass, channel: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn pass_started(&self, pass: Pass, channel: &str) {
        (**self).pass_started(pass, channel);
    }
    fn object_skipped(&self, channel: &str, skipped: &SkippedObject) {
        (**self).object_skipped(channel, skipped);
    }
    fn package_created(&self, package: &Package) {
        (**self).package_created(package);
    }
    fn version_evicted(&self, version: &PackageVersion, reason: EvictionReason) {
        (**self).version_evicted(version, reason);
    }
    fn filename_shadowed(&self, channel: &str, dropped: &PackageVersion) {
        (**self).filename_shadowed(channel, dropped);
    }
    fn index_written(&self, channel: &str, platform: &Platform, entries: usize) {
        (**self).index_written(channel, platform, entries);
    }
    fn channel_failed(&self, pass: Pass, channel: &str, error: &ReconcileError) {
        (**self).channel_failed(pass, channel, error);
    }
    fn pass_finished(&self, pass: Pass, channel: &str) {
        (**self).pass_finished(pass, channel);
    }
}

/// A no-op reporter for silent operations (e.g. testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn pass_started(&self, _: Pass, _: &str) {}
    fn object_skipped(&self, _: &str, _: &SkippedObject) {}
    fn package_created(&self, _: &Package) {}
    fn version_evicted(&self, _: &PackageVersion, _: EvictionReason) {}
    fn filename_shadowed(&self, _: &str, _: &PackageVersion) {}
    fn index_written(&self, _: &str, _: &Platform, _: usize) {}
    fn channel_failed(&self, _: Pass, _: &str, _: &ReconcileError) {}
    fn pass_finished(&self, _: Pass, _: &str) {}
}

/// Default reporter: forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn pass_started(&self, pass: Pass, channel: &str) {
        tracing::info!(%pass, channel, "pass started");
    }

    fn object_skipped(&self, channel: &str, skipped: &SkippedObject) {
        tracing::warn!(channel, path = %skipped.path, "skipping object: {}", skipped.error);
    }

    fn package_created(&self, package: &Package) {
        tracing::info!(channel = %package.channel, package = %package.name, "package discovered");
    }

    fn version_evicted(&self, version: &PackageVersion, reason: EvictionReason) {
        tracing::warn!(
            channel = %version.channel,
            path = %version.store_path(),
            "evicting version: {reason}"
        );
    }

    fn filename_shadowed(&self, channel: &str, dropped: &PackageVersion) {
        tracing::warn!(
            channel,
            path = %dropped.store_path(),
            id = dropped.id,
            "filename already indexed by an older version, leaving this one out"
        );
    }

    fn index_written(&self, channel: &str, platform: &Platform, entries: usize) {
        tracing::debug!(channel, subdir = %platform, entries, "repodata written");
    }

    fn channel_failed(&self, pass: Pass, channel: &str, error: &ReconcileError) {
        tracing::error!(%pass, channel, "channel failed: {error}");
    }

    fn pass_finished(&self, pass: Pass, channel: &str) {
        tracing::info!(%pass, channel, "pass finished");
    }
}
