/// A conda platform subdirectory (e.g. `linux-64`, `osx-arm64`, `noarch`).
///
/// Every package archive in a channel lives directly under one of these
/// directories, and each directory carries its own `repodata.json`.
///
/// # Example
///
/// ```
/// use repodex_schema::Platform;
///
/// let platform: Platform = "linux-64".parse().unwrap();
/// assert!(platform.is_known());
/// assert_eq!(platform.as_str(), "linux-64");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Platform(String);

/// Subdirectories understood by conda clients.
pub const KNOWN_PLATFORMS: &[&str] = &[
    "noarch",
    "emscripten-wasm32",
    "wasi-wasm32",
    "freebsd-64",
    "linux-32",
    "linux-64",
    "linux-aarch64",
    "linux-armv6l",
    "linux-armv7l",
    "linux-ppc64",
    "linux-ppc64le",
    "linux-riscv64",
    "linux-s390x",
    "osx-64",
    "osx-arm64",
    "win-32",
    "win-64",
    "win-arm64",
    "zos-z",
];

impl Platform {
    /// The architecture-independent subdirectory.
    pub const NOARCH: &'static str = "noarch";

    /// Create a platform without checking it against [`KNOWN_PLATFORMS`].
    ///
    /// # Errors
    ///
    /// Returns an error string if `s` is empty or contains a path separator.
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if s.is_empty() || s.contains('/') || s.contains('\\') {
            return Err(format!("Invalid platform subdirectory: '{s}'"));
        }
        Ok(Self(s))
    }

    /// The `noarch` platform.
    pub fn noarch() -> Self {
        Self(Self::NOARCH.to_string())
    }

    /// Whether this is one of the subdirectories conda clients request.
    pub fn is_known(&self) -> bool {
        KNOWN_PLATFORMS.contains(&self.0.as_str())
    }

    /// Return the subdirectory name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Platform {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Archive container of a conda package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ArchiveFormat {
    /// Legacy bzip2-compressed tarball (`.tar.bz2`).
    #[serde(rename = ".tar.bz2")]
    TarBz2,
    /// Zip container with zstd-compressed inner tarballs (`.conda`).
    #[serde(rename = ".conda")]
    Conda,
}

impl ArchiveFormat {
    /// Detect the archive format from a filename's extension.
    ///
    /// ```
    /// use repodex_schema::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::from_filename("a-1-0.conda"), Some(ArchiveFormat::Conda));
    /// assert_eq!(ArchiveFormat::from_filename("repodata.json"), None);
    /// ```
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.ends_with(".tar.bz2") {
            Some(Self::TarBz2)
        } else if filename.ends_with(".conda") {
            Some(Self::Conda)
        } else {
            None
        }
    }

    /// The extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarBz2 => ".tar.bz2",
            Self::Conda => ".conda",
        }
    }

    /// Strip this format's extension from `filename`.
    pub fn strip(self, filename: &str) -> Option<&str> {
        filename.strip_suffix(self.extension())
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_rejects_separators() {
        assert!(Platform::new("linux-64/extra").is_err());
        assert!(Platform::new("").is_err());
        assert!(Platform::new("my-custom-subdir").is_ok());
    }

    #[test]
    fn test_known_platforms() {
        assert!(Platform::noarch().is_known());
        assert!(!Platform::new("amiga-68k").unwrap().is_known());
    }

    #[test]
    fn test_archive_strip() {
        assert_eq!(
            ArchiveFormat::TarBz2.strip("test-package-0.1-0.tar.bz2"),
            Some("test-package-0.1-0")
        );
        assert_eq!(ArchiveFormat::Conda.strip("test-package-0.1-0.tar.bz2"), None);
    }
}
