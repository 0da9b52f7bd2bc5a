//! Catalog synchronization (reindex).
//!
//! A reindex makes the catalog a superset of what the store holds for one
//! channel, then rewrites the channel's indexes from the catalog. Nothing is
//! ever removed here; that is the validator's job.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;

use futures::stream::{self, StreamExt};
use repodex_schema::{
    Channel, ChannelDescriptor, Identity, NewPackageVersion, Package, PackageVersion, Platform,
    Role, VersionKey,
};
use tokio_util::sync::CancellationToken;

use crate::error::{BatchOutcome, ChannelFailure, ReconcileError};
use crate::index;
use crate::reconciler::Reconciler;
use crate::reporter::Pass;
use crate::scanner::{scan_channel, store_channels};

/// What one synchronization of a channel changed.
#[derive(Debug)]
pub(crate) struct SyncOutcome {
    pub(crate) channel: Channel,
    pub(crate) created_packages: Vec<Package>,
    pub(crate) created_versions: usize,
    pub(crate) indexed: Vec<Platform>,
}

/// Per-channel results of a batch pass, in input order.
pub(crate) struct BatchRun<T> {
    pub(crate) done: Vec<T>,
    pub(crate) failures: Vec<ChannelFailure>,
    pub(crate) cancelled: Vec<String>,
}

impl Reconciler {
    /// Bring the catalog in line with the store for `channel`, then rewrite
    /// its indexes.
    ///
    /// The catalog channel row is created (owned by `owner`) if absent.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ChannelNotFound`] if the store has no such
    /// namespace; store and catalog failures are propagated.
    pub async fn reindex(&self, channel: &str, owner: &Identity) -> Result<Channel, ReconcileError> {
        let _guard = self.locks.lock(channel).await;
        self.reporter.pass_started(Pass::Reindex, channel);
        let result = self.sync_channel(channel, owner).await;
        self.reporter.pass_finished(Pass::Reindex, channel);

        let outcome = result?;
        tracing::info!(
            channel,
            packages = outcome.created_packages.len(),
            versions = outcome.created_versions,
            subdirs = outcome.indexed.len(),
            "reindexed"
        );
        Ok(outcome.channel)
    }

    /// Reindex every channel in the store.
    ///
    /// # Errors
    ///
    /// Only if the store's channels cannot be listed; per-channel failures
    /// are collected in the outcome.
    pub async fn reindex_all(&self, owner: &Identity) -> Result<BatchOutcome, ReconcileError> {
        self.reindex_all_until(owner, &CancellationToken::new())
            .await
    }

    /// [`Reconciler::reindex_all`] that stops starting new channels once
    /// `cancel` fires. Channels already in flight run to completion.
    ///
    /// # Errors
    ///
    /// Only if the store's channels cannot be listed.
    pub async fn reindex_all_until(
        &self,
        owner: &Identity,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, ReconcileError> {
        let channels = store_channels(self.store.as_ref()).await?;
        let run = self
            .run_batch(Pass::Reindex, channels, cancel, |name| async move {
                self.reindex(&name, owner).await
            })
            .await;

        Ok(BatchOutcome {
            channels: run.done,
            failures: run.failures,
            cancelled: run.cancelled,
        })
    }

    /// Run `task` for each channel, at most `parallel` at once, keeping
    /// input order and isolating failures.
    pub(crate) async fn run_batch<T, F, Fut>(
        &self,
        pass: Pass,
        channels: Vec<String>,
        cancel: &CancellationToken,
        task: F,
    ) -> BatchRun<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ReconcileError>>,
    {
        let results: Vec<(String, Option<Result<T, ReconcileError>>)> = stream::iter(channels)
            .map(|name| {
                let task = &task;
                async move {
                    if cancel.is_cancelled() {
                        return (name, None);
                    }
                    let result = task(name.clone()).await;
                    (name, Some(result))
                }
            })
            .buffered(self.options.parallel)
            .collect()
            .await;

        let mut run = BatchRun {
            done: Vec::new(),
            failures: Vec::new(),
            cancelled: Vec::new(),
        };
        for (channel, result) in results {
            match result {
                Some(Ok(value)) => run.done.push(value),
                Some(Err(error)) => {
                    self.reporter.channel_failed(pass, &channel, &error);
                    run.failures.push(ChannelFailure { channel, error });
                }
                None => run.cancelled.push(channel),
            }
        }
        if !run.cancelled.is_empty() {
            tracing::warn!(%pass, skipped = run.cancelled.len(), "batch cancelled");
        }
        run
    }

    /// The reindex body. Callers hold the channel lock.
    pub(crate) async fn sync_channel(
        &self,
        channel: &str,
        owner: &Identity,
    ) -> Result<SyncOutcome, ReconcileError> {
        let scan = scan_channel(self.store.as_ref(), self.parser.as_ref(), channel).await?;
        for skipped in &scan.skipped {
            self.reporter.object_skipped(channel, skipped);
        }

        let channel_row = match self.catalog.get_channel(channel).await? {
            Some(row) => row,
            None => {
                self.catalog
                    .create_channel(&ChannelDescriptor::public(channel), owner, Role::Owner)
                    .await?
            }
        };

        let mut created_packages = Vec::new();
        for name in scan.package_names() {
            let package = self.catalog.upsert_package(channel, name).await?;
            if package.created {
                self.reporter.package_created(&package.row);
            }
            if self.catalog.list_members(package.row.id).await?.is_empty() {
                self.catalog
                    .attach_member(package.row.id, owner, Role::Owner)
                    .await?;
            }
            if package.created {
                created_packages.push(package.row);
            }
        }

        let existing: HashSet<VersionKey> = self
            .catalog
            .list_versions(channel)
            .await?
            .iter()
            .map(|v| v.key())
            .collect();

        let mut created_versions = 0;
        for object in scan.objects() {
            let parsed = &object.parsed;
            let new = NewPackageVersion {
                channel: channel.to_string(),
                package: parsed.name.clone(),
                version: parsed.version.clone(),
                build: parsed.build.clone(),
                build_number: parsed.build_number,
                platform: parsed.platform.clone(),
                filename: parsed.filename.clone(),
                size: object.size,
                sha256: None,
                uploader: owner.clone(),
            };
            if existing.contains(&new.key()) {
                continue;
            }

            let sha256 = if self.options.compute_sha256 {
                let content = self.store.read_object(channel, &parsed.path()).await?;
                Some(index::sha256(&content))
            } else {
                None
            };
            let version = self
                .catalog
                .upsert_version(NewPackageVersion { sha256, ..new })
                .await?;
            if version.created {
                tracing::debug!(channel, path = %parsed.path(), "version recorded");
                created_versions += 1;
            }
        }

        // Indexes go last so a failure above never publishes a partial view.
        let versions = self.catalog.list_versions(channel).await?;
        let mut subdirs: BTreeSet<Platform> = scan.subdirs.keys().cloned().collect();
        subdirs.extend(versions.iter().map(|v| v.platform.clone()));
        if self.options.noarch_always {
            subdirs.insert(Platform::noarch());
        }

        // Only rows backed by a live object of the recorded size are listed.
        // Stale rows stay in the catalog until validate evicts them.
        let live: HashMap<String, u64> = scan
            .objects()
            .map(|object| (object.parsed.path(), object.size))
            .collect();
        let valid: Vec<PackageVersion> = versions
            .into_iter()
            .filter(|v| live.get(&v.store_path()) == Some(&v.size))
            .collect();

        let mut indexed = Vec::with_capacity(subdirs.len());
        for platform in subdirs {
            self.publish_index(channel, &platform, &valid).await?;
            indexed.push(platform);
        }

        Ok(SyncOutcome {
            channel: channel_row,
            created_packages,
            created_versions,
            indexed,
        })
    }
}
