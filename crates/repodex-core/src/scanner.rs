//! Store scanning: list a channel namespace and decompose its archives.

use std::collections::BTreeMap;

use repodex_schema::{ArchiveFormat, ParseError, ParsedFilename, Platform};

use crate::error::ReconcileError;
use crate::parser::FilenameParser;
use crate::store::PackageStore;

/// A package archive found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedObject {
    /// Package coordinates decoded from the key.
    pub parsed: ParsedFilename,
    /// Live size at listing time.
    pub size: u64,
}

/// An archive-looking object the parser rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedObject {
    /// Path relative to the channel namespace.
    pub path: String,
    /// Why the parser rejected it.
    pub error: ParseError,
}

/// Everything found under one channel namespace.
#[derive(Debug, Clone, Default)]
pub struct ChannelScan {
    /// Channel that was scanned.
    pub channel: String,
    /// Archives grouped by platform subdirectory, each group sorted by path.
    pub subdirs: BTreeMap<Platform, Vec<ScannedObject>>,
    /// Archives the parser rejected.
    pub skipped: Vec<SkippedObject>,
}

impl ChannelScan {
    /// Every scanned archive, subdirectory by subdirectory.
    pub fn objects(&self) -> impl Iterator<Item = &ScannedObject> {
        self.subdirs.values().flatten()
    }

    /// Distinct package names in first-seen order.
    pub fn package_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for object in self.objects() {
            if !names.contains(&object.parsed.name.as_str()) {
                names.push(&object.parsed.name);
            }
        }
        names
    }
}

/// List `channel` and parse every archive in it.
///
/// Objects that are not archives (e.g. `repodata.json`) are ignored. Archives
/// the parser rejects end up in [`ChannelScan::skipped`] rather than failing
/// the scan.
///
/// # Errors
///
/// [`ReconcileError::ChannelNotFound`] if the namespace does not exist, or a
/// store error if listing fails.
pub async fn scan_channel(
    store: &dyn PackageStore,
    parser: &dyn FilenameParser,
    channel: &str,
) -> Result<ChannelScan, ReconcileError> {
    if !store.channel_exists(channel).await? {
        return Err(ReconcileError::ChannelNotFound(channel.to_string()));
    }

    let mut scan = ChannelScan {
        channel: channel.to_string(),
        ..ChannelScan::default()
    };

    for object in store.list_objects(channel).await? {
        let filename = object.path.rsplit('/').next().unwrap_or(&object.path);
        if ArchiveFormat::from_filename(filename).is_none() {
            tracing::trace!(channel, path = %object.path, "ignoring non-archive object");
            continue;
        }

        match parser.parse(&object.path) {
            Ok(parsed) => {
                tracing::debug!(channel, path = %object.path, size = object.size, "scanned");
                scan.subdirs
                    .entry(parsed.platform.clone())
                    .or_default()
                    .push(ScannedObject {
                        parsed,
                        size: object.size,
                    });
            }
            Err(error) => scan.skipped.push(SkippedObject {
                path: object.path,
                error,
            }),
        }
    }

    Ok(scan)
}

/// Channel namespaces present in the store, in enumeration order.
///
/// # Errors
///
/// Returns a store error if listing fails.
pub async fn store_channels(store: &dyn PackageStore) -> Result<Vec<String>, ReconcileError> {
    Ok(store.list_channels().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CondaFilenameParser;
    use crate::test_support::fs_store;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_scan_groups_and_skips() {
        let dir = TempDir::new().unwrap();
        let store = fs_store(&dir);
        store.create_channel("main").await.unwrap();
        for (path, data) in [
            ("linux-64/test-package-0.1-0.tar.bz2", &b"aa"[..]),
            ("linux-64/test-package-0.2-0.tar.bz2", b"bbb"),
            ("linux-64/repodata.json", b"{}"),
            ("noarch/other-package-1.0-0.conda", b"c"),
            ("noarch/garbage.tar.bz2", b"d"),
        ] {
            store.add_object(data.to_vec(), "main", path).await.unwrap();
        }

        let scan = scan_channel(&store, &CondaFilenameParser::default(), "main")
            .await
            .unwrap();

        assert_eq!(scan.subdirs.len(), 2);
        let linux = &scan.subdirs[&Platform::new("linux-64").unwrap()];
        assert_eq!(linux.len(), 2);
        assert_eq!(linux[0].size, 2);
        assert_eq!(linux[1].parsed.version, "0.2");
        assert_eq!(scan.package_names(), vec!["test-package", "other-package"]);

        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].path, "noarch/garbage.tar.bz2");
    }

    #[tokio::test]
    async fn test_missing_channel() {
        let dir = TempDir::new().unwrap();
        let store = fs_store(&dir);
        let err = scan_channel(&store, &CondaFilenameParser::default(), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ChannelNotFound(name) if name == "ghost"));
    }
}
