use crate::platform::{ArchiveFormat, Platform};

/// A store key decomposed into the coordinates of a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    /// Package name (may itself contain dashes).
    pub name: String,
    /// Version string.
    pub version: String,
    /// Build string.
    pub build: String,
    /// Build number (trailing numeric component of the build string).
    pub build_number: u64,
    /// Platform subdirectory the object lives in.
    pub platform: Platform,
    /// Bare filename, without the subdirectory.
    pub filename: String,
    /// Archive container.
    pub format: ArchiveFormat,
}

impl ParsedFilename {
    /// Store path relative to the channel namespace.
    pub fn path(&self) -> String {
        format!("{}/{}", self.platform, self.filename)
    }
}

/// Reasons a store key cannot be decomposed into a package version.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The key is not of the form `<platform>/<filename>`.
    #[error("'{0}' is not of the form <platform>/<filename>")]
    Layout(String),

    /// The subdirectory is not a recognized platform.
    #[error("'{key}': unknown platform subdirectory '{platform}'")]
    UnknownPlatform {
        /// Offending store key.
        key: String,
        /// The subdirectory that was found.
        platform: String,
    },

    /// The filename does not end in a supported archive extension.
    #[error("'{0}' is not a .tar.bz2 or .conda archive")]
    UnsupportedExtension(String),

    /// The filename stem is not `<name>-<version>-<build>`.
    #[error("'{key}': {reason}")]
    Malformed {
        /// Offending store key.
        key: String,
        /// What was wrong with the stem.
        reason: String,
    },
}
