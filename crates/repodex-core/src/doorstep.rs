//! Doorstep discovery: onboard channels that exist in the store but not in
//! the catalog.

use std::collections::HashSet;

use repodex_schema::{Channel, Identity, Package};
use tokio_util::sync::CancellationToken;

use crate::error::{ChannelFailure, ReconcileError};
use crate::reconciler::Reconciler;
use crate::reporter::Pass;
use crate::scanner::store_channels;
use crate::sync::SyncOutcome;

/// Result of a doorstep scan.
#[derive(Debug, Default)]
pub struct DoorstepOutcome {
    /// Channels created by this call, in store order.
    pub onboarded: Vec<Channel>,
    /// Packages created by this call, in creation order.
    pub packages: Vec<Package>,
    /// New channels that failed to onboard; their catalog rows were rolled back.
    pub failures: Vec<ChannelFailure>,
    /// New channels not started because the scan was cancelled.
    pub cancelled: Vec<String>,
}

impl DoorstepOutcome {
    /// No failures and nothing cancelled.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cancelled.is_empty()
    }
}

impl Reconciler {
    /// Onboard every store channel the catalog does not know yet.
    ///
    /// Channels already in the catalog are not touched, so running this
    /// again right after returns nothing.
    ///
    /// # Errors
    ///
    /// Only if the store or catalog channel lists cannot be read;
    /// per-channel failures are collected in the outcome.
    pub async fn check_doorstep(&self, owner: &Identity) -> Result<DoorstepOutcome, ReconcileError> {
        self.check_doorstep_until(owner, &CancellationToken::new())
            .await
    }

    /// [`Reconciler::check_doorstep`] that stops onboarding new channels once
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Only if the store or catalog channel lists cannot be read.
    pub async fn check_doorstep_until(
        &self,
        owner: &Identity,
        cancel: &CancellationToken,
    ) -> Result<DoorstepOutcome, ReconcileError> {
        let known: HashSet<String> = self
            .catalog
            .list_channels()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        let new_channels: Vec<String> = store_channels(self.store.as_ref())
            .await?
            .into_iter()
            .filter(|name| !known.contains(name))
            .collect();

        if new_channels.is_empty() {
            tracing::debug!("doorstep: no new channels");
            return Ok(DoorstepOutcome::default());
        }
        tracing::info!(count = new_channels.len(), "doorstep: new channels found");

        let run = self
            .run_batch(Pass::Doorstep, new_channels, cancel, |name| async move {
                self.onboard(&name, owner).await
            })
            .await;

        let mut outcome = DoorstepOutcome {
            failures: run.failures,
            cancelled: run.cancelled,
            ..DoorstepOutcome::default()
        };
        for synced in run.done.into_iter().flatten() {
            outcome.onboarded.push(synced.channel);
            outcome.packages.extend(synced.created_packages);
        }
        // Channels run concurrently, so restore creation order.
        outcome.packages.sort_by_key(|p| p.id);
        Ok(outcome)
    }

    /// Sync a channel unless another pass onboarded it while we waited.
    ///
    /// A failed sync deletes whatever it wrote to the catalog, so the
    /// channel is still new on the next scan.
    async fn onboard(
        &self,
        channel: &str,
        owner: &Identity,
    ) -> Result<Option<SyncOutcome>, ReconcileError> {
        let _guard = self.locks.lock(channel).await;
        if self.catalog.get_channel(channel).await?.is_some() {
            tracing::debug!(channel, "doorstep: already onboarded");
            return Ok(None);
        }

        self.reporter.pass_started(Pass::Doorstep, channel);
        let result = self.sync_channel(channel, owner).await;
        if result.is_err() {
            self.roll_back(channel).await;
        }
        self.reporter.pass_finished(Pass::Doorstep, channel);
        result.map(Some)
    }

    /// Remove a half-onboarded channel. Callers hold the channel lock and
    /// saw no catalog row before syncing, so every row under it is ours.
    async fn roll_back(&self, channel: &str) {
        match self.catalog.delete_channel(channel).await {
            Ok(true) => tracing::warn!(channel, "doorstep: onboarding failed, rolled back"),
            Ok(false) => {}
            Err(e) => tracing::error!(channel, "doorstep: rollback failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::store::PackageStore;
    use crate::test_support::Harness;

    fn alice() -> Identity {
        Identity::from("alice")
    }

    #[tokio::test]
    async fn test_onboards_only_new_channels() {
        let h = Harness::new();
        h.put("known", "noarch/old-1.0-0.tar.bz2", b"o").await;
        h.reconciler.reindex("known", &alice()).await.unwrap();
        // A new object in a known channel is not the doorstep's business.
        h.put("known", "noarch/later-1.0-0.tar.bz2", b"l").await;
        h.put("fresh", "linux-64/new-pkg-1.0-0.tar.bz2", b"n").await;
        h.put("fresh", "noarch/other-2.0-0.conda", b"m").await;

        let outcome = h.reconciler.check_doorstep(&alice()).await.unwrap();

        assert!(outcome.is_clean());
        assert_eq!(
            outcome.onboarded.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["fresh"]
        );
        assert_eq!(
            outcome.packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["new-pkg", "other"]
        );
        assert_eq!(h.catalog.list_packages("known").await.unwrap().len(), 1);
        assert_eq!(h.repodata("fresh", "linux-64").await.len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_returns_nothing() {
        let h = Harness::new();
        h.put("fresh", "linux-64/new-pkg-1.0-0.tar.bz2", b"n").await;

        let first = h.reconciler.check_doorstep(&alice()).await.unwrap();
        assert_eq!(first.packages.len(), 1);

        let second = h.reconciler.check_doorstep(&alice()).await.unwrap();
        assert!(second.onboarded.is_empty());
        assert!(second.packages.is_empty());
    }

    #[tokio::test]
    async fn test_failed_onboarding_is_retried() {
        let h = Harness::new();
        h.put("fresh", "linux-64/new-pkg-1.0-0.tar.bz2", b"n").await;
        let blocker = h.root().join("fresh/noarch/repodata.json");
        std::fs::create_dir_all(&blocker).unwrap();

        let first = h.reconciler.check_doorstep(&alice()).await.unwrap();
        assert_eq!(first.failures.len(), 1);
        assert!(first.onboarded.is_empty());
        assert!(first.packages.is_empty());
        assert!(h.catalog.get_channel("fresh").await.unwrap().is_none());
        assert!(h.catalog.list_packages("fresh").await.unwrap().is_empty());

        std::fs::remove_dir(&blocker).unwrap();
        let second = h.reconciler.check_doorstep(&alice()).await.unwrap();
        assert!(second.is_clean());
        assert_eq!(
            second.onboarded.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["fresh"]
        );
        assert_eq!(
            second.packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["new-pkg"]
        );
        assert!(h.repodata("fresh", "noarch").await.is_empty());
        assert_eq!(h.repodata("fresh", "linux-64").await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_channel_is_onboarded() {
        let h = Harness::new();
        h.store.create_channel("empty").await.unwrap();

        let outcome = h.reconciler.check_doorstep(&alice()).await.unwrap();
        assert_eq!(outcome.onboarded.len(), 1);
        assert!(outcome.packages.is_empty());
        assert_eq!(
            h.catalog.list_channel_members("empty").await.unwrap(),
            vec![(alice(), repodex_schema::Role::Owner)]
        );
    }
}
