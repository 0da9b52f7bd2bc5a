//! Shared types for the repodex reconciliation engine.
//!
//! This crate holds everything that crosses a collaborator boundary: the
//! catalog rows (channels, packages, versions, members), the platform and
//! archive vocabulary used to decompose store keys, and the `repodata.json`
//! wire format written back into the store.

/// Decomposed store keys and parse failures.
pub mod filename;
/// Content digests.
pub mod hash;
/// Platform subdirectories and archive formats.
pub mod platform;
pub mod repodata;
/// Catalog rows.
pub mod types;

// Re-exports
pub use filename::{ParseError, ParsedFilename};
pub use hash::Sha256Hash;
pub use platform::{ArchiveFormat, Platform};
pub use repodata::{PackageRecord, RepoData, RepoDataInfo};
pub use types::*;

/// Filename of the per-subdirectory index artifact.
pub const REPODATA_FILENAME: &str = "repodata.json";

/// Current `repodata_version` emitted in index artifacts.
pub const REPODATA_VERSION: u32 = 1;
