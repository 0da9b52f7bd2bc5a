//! The `repodata.json` index artifact.
//!
//! One document per channel and platform subdirectory. Maps are `BTreeMap`s
//! and record fields are declared in alphabetical order, so serializing the
//! same catalog state always yields the same bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::platform::ArchiveFormat;
use crate::types::PackageVersion;

/// Subdirectory-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepoDataInfo {
    /// Platform subdirectory this document describes.
    pub subdir: String,
}

/// Per-archive metadata consumed by conda clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Build string.
    pub build: String,
    /// Build number.
    pub build_number: u64,
    /// Run-time dependency specs. Empty: archives are indexed by filename only.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Package name.
    pub name: String,
    /// Hex SHA-256 of the archive, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Archive size in bytes.
    pub size: u64,
    /// Platform subdirectory.
    pub subdir: String,
    /// Discovery time in milliseconds since the UNIX epoch.
    #[serde(default)]
    pub timestamp: i64,
    /// Version string.
    pub version: String,
}

impl From<&PackageVersion> for PackageRecord {
    fn from(v: &PackageVersion) -> Self {
        Self {
            build: v.build.clone(),
            build_number: v.build_number,
            depends: Vec::new(),
            name: v.package.clone(),
            sha256: v.sha256.as_ref().map(|h| h.as_str().to_string()),
            size: v.size,
            subdir: v.platform.to_string(),
            timestamp: v.created_at.saturating_mul(1000),
            version: v.version.clone(),
        }
    }
}

/// A complete `repodata.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepoData {
    /// Subdirectory metadata.
    pub info: RepoDataInfo,
    /// `.tar.bz2` archives keyed by filename.
    #[serde(default)]
    pub packages: BTreeMap<String, PackageRecord>,
    /// `.conda` archives keyed by filename.
    #[serde(rename = "packages.conda", default)]
    pub packages_conda: BTreeMap<String, PackageRecord>,
    /// Always [`crate::REPODATA_VERSION`].
    pub repodata_version: u32,
}

impl RepoData {
    /// An empty document for `subdir`.
    pub fn new(subdir: impl Into<String>) -> Self {
        Self {
            info: RepoDataInfo {
                subdir: subdir.into(),
            },
            packages: BTreeMap::new(),
            packages_conda: BTreeMap::new(),
            repodata_version: crate::REPODATA_VERSION,
        }
    }

    /// Insert a record under `filename`, routed by archive format.
    ///
    /// Returns the record previously stored under the same filename, if any.
    pub fn insert(&mut self, filename: String, record: PackageRecord) -> Option<PackageRecord> {
        match ArchiveFormat::from_filename(&filename) {
            Some(ArchiveFormat::Conda) => self.packages_conda.insert(filename, record),
            _ => self.packages.insert(filename, record),
        }
    }

    /// Whether `filename` is already listed.
    pub fn contains(&self, filename: &str) -> bool {
        self.packages.contains_key(filename) || self.packages_conda.contains_key(filename)
    }

    /// All filenames listed, `.tar.bz2` first, each group sorted.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.packages
            .keys()
            .chain(self.packages_conda.keys())
            .map(String::as_str)
    }

    /// Number of archives listed.
    pub fn len(&self) -> usize {
        self.packages.len() + self.packages_conda.len()
    }

    /// Whether the document lists no archives.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize to pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse a document previously written by [`RepoData::to_json_bytes`].
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a valid repodata document.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
