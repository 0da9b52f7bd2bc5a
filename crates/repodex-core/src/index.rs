//! `repodata.json` generation.
//!
//! An index is a pure function of catalog state: given the versions recorded
//! for one (channel, platform) it always produces the same bytes.

use repodex_schema::{
    PackageRecord, PackageVersion, Platform, REPODATA_FILENAME, RepoData, Sha256Hash,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::ReconcileError;
use crate::reconciler::Reconciler;
use crate::store::PackageStore;

/// Failure to produce an index artifact.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to serialize {channel}/{subdir}/repodata.json: {source}")]
    Serialize {
        channel: String,
        subdir: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Channel-relative path of the index for `platform`.
pub fn index_path(platform: &Platform) -> String {
    format!("{platform}/{REPODATA_FILENAME}")
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Sha256Hash {
    Sha256Hash::from_digest(Sha256::digest(data))
}

/// An index built from catalog rows, before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltIndex {
    /// The document to write.
    pub repodata: RepoData,
    /// Rows left out because an older row already claimed the same filename.
    pub shadowed: Vec<PackageVersion>,
}

/// Build the index for `platform` from `versions`.
///
/// Versions for other platforms are ignored. An empty slice yields a valid,
/// empty index. When two rows share a filename the one with the lowest id
/// is listed and the other ends up in [`BuiltIndex::shadowed`].
pub fn build_repodata(platform: &Platform, versions: &[PackageVersion]) -> BuiltIndex {
    let mut rows: Vec<&PackageVersion> = versions
        .iter()
        .filter(|v| &v.platform == platform)
        .collect();
    rows.sort_by_key(|v| v.id);

    let mut built = BuiltIndex {
        repodata: RepoData::new(platform.as_str()),
        shadowed: Vec::new(),
    };
    for version in rows {
        if built.repodata.contains(&version.filename) {
            built.shadowed.push(version.clone());
        } else {
            built
                .repodata
                .insert(version.filename.clone(), PackageRecord::from(version));
        }
    }
    built
}

/// Build and store the index for `platform`, replacing any previous one.
///
/// # Errors
///
/// Serialization errors, or a store error if the write fails.
pub async fn write_index(
    store: &dyn PackageStore,
    channel: &str,
    platform: &Platform,
    versions: &[PackageVersion],
) -> Result<BuiltIndex, ReconcileError> {
    let built = build_repodata(platform, versions);
    let bytes = built
        .repodata
        .to_json_bytes()
        .map_err(|source| IndexError::Serialize {
            channel: channel.to_string(),
            subdir: platform.to_string(),
            source,
        })?;

    tracing::debug!(
        channel,
        subdir = %platform,
        entries = built.repodata.len(),
        sha256 = %sha256(&bytes),
        "writing repodata"
    );
    store
        .add_object(bytes, channel, &index_path(platform))
        .await?;
    Ok(built)
}

impl Reconciler {
    /// Write the index for `platform` and report what went into it.
    pub(crate) async fn publish_index(
        &self,
        channel: &str,
        platform: &Platform,
        versions: &[PackageVersion],
    ) -> Result<(), ReconcileError> {
        let built = write_index(self.store.as_ref(), channel, platform, versions).await?;
        for version in &built.shadowed {
            self.reporter.filename_shadowed(channel, version);
        }
        self.reporter
            .index_written(channel, platform, built.repodata.len());
        Ok(())
    }
}
