//! Validation: evict catalog versions whose backing object is gone or has
//! changed size, then rewrite the affected indexes.

use std::collections::BTreeSet;

use repodex_schema::{PackageVersion, Platform};

use crate::error::ReconcileError;
use crate::reconciler::Reconciler;
use crate::reporter::{EvictionReason, Pass};

/// What a validation pass checked and repaired.
///
/// Drift is not an error: a report with evictions is a successful pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Versions examined.
    pub checked: usize,
    /// Evicted because the backing object no longer exists.
    pub missing: Vec<PackageVersion>,
    /// Evicted because the backing object changed size.
    pub size_mismatch: Vec<PackageVersion>,
    /// Subdirectories whose index was rewritten.
    pub reindexed: Vec<Platform>,
}

impl ValidationReport {
    /// Total versions evicted.
    pub fn repairs(&self) -> usize {
        self.missing.len() + self.size_mismatch.len()
    }
}

impl Reconciler {
    /// Check every catalog version of `channel` against the store.
    ///
    /// Package and channel rows are never removed; a package whose last
    /// version is evicted stays as a placeholder.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ChannelNotFound`] if the store has no such
    /// namespace; store and catalog failures are propagated.
    pub async fn validate(&self, channel: &str) -> Result<ValidationReport, ReconcileError> {
        let _guard = self.locks.lock(channel).await;
        self.reporter.pass_started(Pass::Validate, channel);
        let result = self.validate_channel(channel).await;
        self.reporter.pass_finished(Pass::Validate, channel);

        let report = result?;
        if report.repairs() > 0 {
            tracing::info!(
                channel,
                checked = report.checked,
                missing = report.missing.len(),
                size_mismatch = report.size_mismatch.len(),
                "drift repaired"
            );
        } else {
            tracing::info!(channel, checked = report.checked, "no drift");
        }
        Ok(report)
    }

    async fn validate_channel(&self, channel: &str) -> Result<ValidationReport, ReconcileError> {
        if !self.store.channel_exists(channel).await? {
            return Err(ReconcileError::ChannelNotFound(channel.to_string()));
        }

        let mut report = ValidationReport::default();
        if self.catalog.get_channel(channel).await?.is_none() {
            tracing::debug!(channel, "not in catalog, nothing to validate");
            return Ok(report);
        }

        let versions = self.catalog.list_versions(channel).await?;
        let mut subdirs: BTreeSet<Platform> =
            versions.iter().map(|v| v.platform.clone()).collect();
        if self.options.noarch_always {
            subdirs.insert(Platform::noarch());
        }

        for version in versions {
            report.checked += 1;
            let reason = match self
                .store
                .object_size(channel, &version.store_path())
                .await?
            {
                None => EvictionReason::Missing,
                Some(actual) if actual != version.size => EvictionReason::SizeMismatch {
                    recorded: version.size,
                    actual,
                },
                Some(_) => continue,
            };

            self.catalog.delete_version(version.id).await?;
            self.reporter.version_evicted(&version, reason);
            match reason {
                EvictionReason::Missing => report.missing.push(version),
                EvictionReason::SizeMismatch { .. } => report.size_mismatch.push(version),
            }
        }

        let survivors = self.catalog.list_versions(channel).await?;
        for platform in subdirs {
            self.publish_index(channel, &platform, &survivors).await?;
            report.reindexed.push(platform);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::store::PackageStore;
    use crate::test_support::Harness;
    use repodex_schema::Identity;

    const V1: &str = "linux-64/test-package-0.1-0.tar.bz2";
    const V2: &str = "linux-64/test-package-0.2-0.tar.bz2";

    async fn seeded() -> Harness {
        let h = Harness::new();
        h.put("main", V1, b"first").await;
        h.put("main", V2, b"second").await;
        h.reconciler
            .reindex("main", &Identity::from("alice"))
            .await
            .unwrap();
        h
    }

    #[tokio::test]
    async fn test_clean_channel_has_no_repairs() {
        let h = seeded().await;
        let report = h.reconciler.validate("main").await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.repairs(), 0);
        assert_eq!(h.repodata("main", "linux-64").await.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_object_evicted() {
        let h = seeded().await;
        h.store.delete_object("main", V1).await.unwrap();

        let report = h.reconciler.validate("main").await.unwrap();

        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].version, "0.1");
        assert!(report.size_mismatch.is_empty());
        let index = h.repodata("main", "linux-64").await;
        assert_eq!(
            index.filenames().collect::<Vec<_>>(),
            vec!["test-package-0.2-0.tar.bz2"]
        );
        assert!(
            h.reporter
                .events()
                .contains(&"evict missing test-package-0.1-0.tar.bz2".to_string())
        );
    }

    #[tokio::test]
    async fn test_size_mismatch_evicted_and_package_kept() {
        let h = seeded().await;
        h.store
            .add_object(b"wrong_size".to_vec(), "main", V1)
            .await
            .unwrap();
        h.store
            .add_object(b"also_wrong".to_vec(), "main", V2)
            .await
            .unwrap();

        let report = h.reconciler.validate("main").await.unwrap();

        assert_eq!(report.size_mismatch.len(), 2);
        assert!(h.catalog.list_versions("main").await.unwrap().is_empty());
        assert_eq!(h.catalog.list_packages("main").await.unwrap().len(), 1);
        assert!(h.repodata("main", "linux-64").await.is_empty());
        assert_eq!(
            report.reindexed,
            vec![Platform::new("linux-64").unwrap(), Platform::noarch()]
        );
    }

    #[tokio::test]
    async fn test_uncatalogued_channel_is_empty_report() {
        let h = Harness::new();
        h.put("loose", V1, b"x").await;
        let report = h.reconciler.validate("loose").await.unwrap();
        assert_eq!(report, ValidationReport::default());
    }

    #[tokio::test]
    async fn test_missing_namespace() {
        let h = Harness::new();
        assert!(matches!(
            h.reconciler.validate("ghost").await,
            Err(ReconcileError::ChannelNotFound(_))
        ));
    }
}
