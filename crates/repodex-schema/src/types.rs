use serde::{Deserialize, Serialize};

use crate::hash::Sha256Hash;
use crate::platform::{ArchiveFormat, Platform};

/// Opaque identity of the user on whose behalf a pass runs.
///
/// The engine never interprets it beyond recording it as a package member
/// and as the uploader of discovered versions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap a caller-supplied identity.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Role of a member on a channel or package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control; attached automatically on first discovery.
    #[default]
    Owner,
    /// May upload new versions.
    Maintainer,
    /// Read access only.
    Member,
}

impl Role {
    /// Convert to the lowercase storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Maintainer => "maintainer",
            Self::Member => "member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "maintainer" => Ok(Self::Maintainer),
            "member" => Ok(Self::Member),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

/// Caller-supplied description of a channel to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Unique channel name; also the store namespace.
    pub name: String,
    /// Visibility flag, stored but not interpreted by the engine.
    pub private: bool,
}

impl ChannelDescriptor {
    /// Describe a public channel.
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            private: false,
        }
    }
}

/// A catalog channel row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Catalog-assigned row id.
    pub id: i64,
    /// Unique channel name.
    pub name: String,
    /// Visibility flag.
    pub private: bool,
}

/// A catalog package row, unique by name within its channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Catalog-assigned row id; increases with creation order.
    pub id: i64,
    /// Owning channel name.
    pub channel: String,
    /// Package name (e.g. `test-package`).
    pub name: String,
}

/// Association between a package and a user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Package row id.
    pub package_id: i64,
    /// Member identity.
    pub identity: Identity,
    /// Role held on the package.
    pub role: Role,
}

/// Uniqueness key of a package version within a channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionKey {
    /// Package name.
    pub package: String,
    /// Version string.
    pub version: String,
    /// Build string.
    pub build: String,
    /// Platform subdirectory.
    pub platform: Platform,
    /// Backing filename.
    pub filename: String,
}

/// Insert payload for a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackageVersion {
    /// Owning channel name.
    pub channel: String,
    /// Owning package name.
    pub package: String,
    /// Version string.
    pub version: String,
    /// Build string.
    pub build: String,
    /// Build number derived from the build string.
    pub build_number: u64,
    /// Platform subdirectory.
    pub platform: Platform,
    /// Backing filename within the subdirectory.
    pub filename: String,
    /// Recorded byte size of the backing object.
    pub size: u64,
    /// Content digest, when the object was read during discovery.
    pub sha256: Option<Sha256Hash>,
    /// Identity the version is attributed to.
    pub uploader: Identity,
}

impl NewPackageVersion {
    /// Uniqueness key of the row this payload would create.
    pub fn key(&self) -> VersionKey {
        VersionKey {
            package: self.package.clone(),
            version: self.version.clone(),
            build: self.build.clone(),
            platform: self.platform.clone(),
            filename: self.filename.clone(),
        }
    }
}

/// A catalog package version row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    /// Catalog-assigned row id; increases with creation order.
    pub id: i64,
    /// Owning channel name.
    pub channel: String,
    /// Owning package name.
    pub package: String,
    /// Version string.
    pub version: String,
    /// Build string.
    pub build: String,
    /// Build number derived from the build string.
    pub build_number: u64,
    /// Platform subdirectory.
    pub platform: Platform,
    /// Backing filename within the subdirectory.
    pub filename: String,
    /// Recorded byte size of the backing object.
    pub size: u64,
    /// Content digest recorded at discovery.
    pub sha256: Option<Sha256Hash>,
    /// Identity the version is attributed to.
    pub uploader: Identity,
    /// Creation time, seconds since the UNIX epoch.
    pub created_at: i64,
}

impl PackageVersion {
    /// Materialize a row from an insert payload.
    pub fn from_new(id: i64, new: NewPackageVersion, created_at: i64) -> Self {
        Self {
            id,
            channel: new.channel,
            package: new.package,
            version: new.version,
            build: new.build,
            build_number: new.build_number,
            platform: new.platform,
            filename: new.filename,
            size: new.size,
            sha256: new.sha256,
            uploader: new.uploader,
            created_at,
        }
    }

    /// Uniqueness key of this row.
    pub fn key(&self) -> VersionKey {
        VersionKey {
            package: self.package.clone(),
            version: self.version.clone(),
            build: self.build.clone(),
            platform: self.platform.clone(),
            filename: self.filename.clone(),
        }
    }

    /// Store path of the backing object, relative to the channel namespace.
    pub fn store_path(&self) -> String {
        format!("{}/{}", self.platform, self.filename)
    }

    /// Archive format implied by the backing filename.
    pub fn format(&self) -> Option<ArchiveFormat> {
        ArchiveFormat::from_filename(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewPackageVersion {
        NewPackageVersion {
            channel: "main".to_string(),
            package: "test-package".to_string(),
            version: "0.1".to_string(),
            build: "0".to_string(),
            build_number: 0,
            platform: Platform::new("linux-64").unwrap(),
            filename: "test-package-0.1-0.tar.bz2".to_string(),
            size: 42,
            sha256: None,
            uploader: Identity::from("bartosz"),
        }
    }

    #[test]
    fn test_key_survives_materialization() {
        let new = sample();
        let key = new.key();
        let row = PackageVersion::from_new(7, new, 1_700_000_000);
        assert_eq!(row.key(), key);
        assert_eq!(row.store_path(), "linux-64/test-package-0.1-0.tar.bz2");
        assert_eq!(row.format(), Some(ArchiveFormat::TarBz2));
    }

    #[test]
    fn test_role_round_trip_through_storage_name() {
        for role in [Role::Owner, Role::Maintainer, Role::Member] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }
}
