//! Store key → package coordinates.

use repodex_schema::{ArchiveFormat, ParseError, ParsedFilename, Platform};

/// Decomposes a channel-relative store key into package coordinates.
///
/// Implementations must be pure: the same key always yields the same result.
pub trait FilenameParser: Send + Sync {
    /// Parse `key` (e.g. `linux-64/test-package-0.1-0.tar.bz2`).
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] describing why the key is not a package.
    fn parse(&self, key: &str) -> Result<ParsedFilename, ParseError>;
}

/// Conda filename grammar: `<platform>/<name>-<version>-<build>.<ext>`.
///
/// The name may contain dashes; version and build may not, so the stem is
/// split on its last two dashes.
#[derive(Debug, Clone, Default)]
pub struct CondaFilenameParser {
    allow_unknown_platforms: bool,
}

impl CondaFilenameParser {
    /// Accept subdirectories outside [`repodex_schema::platform::KNOWN_PLATFORMS`].
    pub fn allow_unknown_platforms(mut self, allow: bool) -> Self {
        self.allow_unknown_platforms = allow;
        self
    }
}

impl FilenameParser for CondaFilenameParser {
    fn parse(&self, key: &str) -> Result<ParsedFilename, ParseError> {
        let mut segments = key.split('/');
        let (Some(subdir), Some(filename), None) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(ParseError::Layout(key.to_string()));
        };

        let platform = Platform::new(subdir).map_err(|_| ParseError::Layout(key.to_string()))?;
        if !self.allow_unknown_platforms && !platform.is_known() {
            return Err(ParseError::UnknownPlatform {
                key: key.to_string(),
                platform: subdir.to_string(),
            });
        }

        let format = ArchiveFormat::from_filename(filename)
            .ok_or_else(|| ParseError::UnsupportedExtension(key.to_string()))?;
        let stem = format
            .strip(filename)
            .ok_or_else(|| ParseError::UnsupportedExtension(key.to_string()))?;

        let malformed = |reason: &str| ParseError::Malformed {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = stem.rsplitn(3, '-');
        let build = parts.next().unwrap_or_default();
        let version = parts.next().ok_or_else(|| malformed("missing version"))?;
        let name = parts.next().ok_or_else(|| malformed("missing build string"))?;

        if name.is_empty() {
            return Err(malformed("empty package name"));
        }
        if version.is_empty() {
            return Err(malformed("empty version"));
        }
        if build.is_empty() {
            return Err(malformed("empty build string"));
        }

        Ok(ParsedFilename {
            name: name.to_string(),
            version: version.to_string(),
            build: build.to_string(),
            build_number: build_number(build),
            platform,
            filename: filename.to_string(),
            format,
        })
    }
}

/// Conda convention: the build number is the last `_`-separated component
/// of the build string when numeric (`py38h1a2b_3` → 3, `0` → 0).
fn build_number(build: &str) -> u64 {
    build
        .rsplit('_')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}
