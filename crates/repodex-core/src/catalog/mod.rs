//! Catalog access
//!
//! The catalog is the authoritative record of channels, packages, versions
//! and ownership. The engine only talks to it through [`Catalog`], so the
//! same passes run against SQLite ([`SqliteCatalog`]) or an in-memory fake
//! ([`MemoryCatalog`]).

pub mod actor;
pub mod db;
pub mod memory;

pub use actor::SqliteCatalog;
pub use db::CatalogDb;
pub use memory::MemoryCatalog;

use async_trait::async_trait;
use repodex_schema::{
    Channel, ChannelDescriptor, Identity, Member, NewPackageVersion, Package, PackageVersion,
    Role,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("catalog actor stopped")]
    ActorDied,

    #[error("channel '{0}' already exists in the catalog")]
    ChannelExists(String),

    #[error("channel '{0}' not found in the catalog")]
    ChannelNotFound(String),

    #[error("package '{channel}/{package}' not found in the catalog")]
    PackageNotFound { channel: String, package: String },

    #[error("package id {0} not found in the catalog")]
    PackageIdNotFound(i64),
}

/// Result of an idempotent insert: the row as stored, and whether this call
/// created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert<T> {
    /// The stored row.
    pub row: T,
    /// Whether this call inserted it.
    pub created: bool,
}

impl<T> Upsert<T> {
    /// A freshly inserted row.
    pub fn created(row: T) -> Self {
        Self { row, created: true }
    }

    /// A row that was already there.
    pub fn existing(row: T) -> Self {
        Self {
            row,
            created: false,
        }
    }
}

/// Relational access object consumed by the reconciliation passes.
///
/// Listing operations return rows in creation order.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Create a channel and record `owner` as a channel member with `role`.
    async fn create_channel(
        &self,
        descriptor: &ChannelDescriptor,
        owner: &Identity,
        role: Role,
    ) -> Result<Channel, CatalogError>;

    async fn get_channel(&self, name: &str) -> Result<Option<Channel>, CatalogError>;

    async fn list_channels(&self) -> Result<Vec<Channel>, CatalogError>;

    /// Channel-level members, as recorded by [`Catalog::create_channel`].
    async fn list_channel_members(
        &self,
        channel: &str,
    ) -> Result<Vec<(Identity, Role)>, CatalogError>;

    /// Create the package if absent. The channel must exist.
    async fn upsert_package(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Upsert<Package>, CatalogError>;

    async fn list_packages(&self, channel: &str) -> Result<Vec<Package>, CatalogError>;

    /// Attach `identity` to a package. An existing membership is returned
    /// unchanged, whatever `role` was requested.
    async fn attach_member(
        &self,
        package_id: i64,
        identity: &Identity,
        role: Role,
    ) -> Result<Upsert<Member>, CatalogError>;

    async fn list_members(&self, package_id: i64) -> Result<Vec<Member>, CatalogError>;

    /// Create the version unless a row with the same
    /// (package, version, build, platform, filename) exists in the channel.
    /// The package must exist.
    async fn upsert_version(
        &self,
        version: NewPackageVersion,
    ) -> Result<Upsert<PackageVersion>, CatalogError>;

    /// Every version recorded under `channel`.
    async fn list_versions(&self, channel: &str) -> Result<Vec<PackageVersion>, CatalogError>;

    /// Delete a version row. Returns whether a row was removed.
    async fn delete_version(&self, id: i64) -> Result<bool, CatalogError>;

    /// Delete a channel together with its members, packages and versions.
    /// Returns whether the channel existed.
    async fn delete_channel(&self, name: &str) -> Result<bool, CatalogError>;

    /// Versions of one package, in creation order.
    async fn list_package_versions(
        &self,
        channel: &str,
        package: &str,
    ) -> Result<Vec<PackageVersion>, CatalogError> {
        Ok(self
            .list_versions(channel)
            .await?
            .into_iter()
            .filter(|v| v.package == package)
            .collect())
    }
}

pub(crate) fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Shared behavioural checks run against every [`Catalog`] implementation.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use repodex_schema::Platform;

    pub(crate) fn new_version(package: &str, version: &str) -> NewPackageVersion {
        NewPackageVersion {
            channel: "main".to_string(),
            package: package.to_string(),
            version: version.to_string(),
            build: "0".to_string(),
            build_number: 0,
            platform: Platform::new("linux-64").unwrap(),
            filename: format!("{package}-{version}-0.tar.bz2"),
            size: 100,
            sha256: None,
            uploader: Identity::from("alice"),
        }
    }

    pub(crate) async fn run(catalog: &dyn Catalog) {
        let alice = Identity::from("alice");
        let bob = Identity::from("bob");

        let channel = catalog
            .create_channel(&ChannelDescriptor::public("main"), &alice, Role::Owner)
            .await
            .unwrap();
        assert_eq!(channel.name, "main");
        assert!(matches!(
            catalog
                .create_channel(&ChannelDescriptor::public("main"), &alice, Role::Owner)
                .await,
            Err(CatalogError::ChannelExists(_))
        ));
        assert_eq!(
            catalog.get_channel("main").await.unwrap(),
            Some(channel.clone())
        );
        assert_eq!(catalog.get_channel("nope").await.unwrap(), None);
        assert_eq!(
            catalog.list_channel_members("main").await.unwrap(),
            vec![(alice.clone(), Role::Owner)]
        );

        // Packages are unique per channel.
        let first = catalog.upsert_package("main", "test-package").await.unwrap();
        assert!(first.created);
        let again = catalog.upsert_package("main", "test-package").await.unwrap();
        assert!(!again.created);
        assert_eq!(first.row, again.row);
        let other = catalog.upsert_package("main", "other-package").await.unwrap();
        assert_eq!(
            catalog
                .list_packages("main")
                .await
                .unwrap()
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>(),
            vec!["test-package", "other-package"]
        );
        assert!(matches!(
            catalog.upsert_package("nope", "x").await,
            Err(CatalogError::ChannelNotFound(_))
        ));

        // Membership is attached once and never altered.
        let member = catalog
            .attach_member(first.row.id, &alice, Role::Owner)
            .await
            .unwrap();
        assert!(member.created);
        let member = catalog
            .attach_member(first.row.id, &alice, Role::Member)
            .await
            .unwrap();
        assert!(!member.created);
        assert_eq!(member.row.role, Role::Owner);
        catalog
            .attach_member(first.row.id, &bob, Role::Maintainer)
            .await
            .unwrap();
        assert_eq!(catalog.list_members(first.row.id).await.unwrap().len(), 2);
        assert!(catalog.list_members(other.row.id).await.unwrap().is_empty());

        // Versions are unique by their key.
        let v1 = catalog
            .upsert_version(new_version("test-package", "0.1"))
            .await
            .unwrap();
        assert!(v1.created);
        let dup = catalog
            .upsert_version(new_version("test-package", "0.1"))
            .await
            .unwrap();
        assert!(!dup.created);
        assert_eq!(dup.row.id, v1.row.id);
        let v2 = catalog
            .upsert_version(new_version("test-package", "0.2"))
            .await
            .unwrap();
        catalog
            .upsert_version(new_version("other-package", "1.0"))
            .await
            .unwrap();
        assert!(matches!(
            catalog.upsert_version(new_version("ghost", "1.0")).await,
            Err(CatalogError::PackageNotFound { .. })
        ));

        let versions = catalog
            .list_package_versions("main", "test-package")
            .await
            .unwrap();
        assert_eq!(
            versions.iter().map(|v| v.version.as_str()).collect::<Vec<_>>(),
            vec!["0.1", "0.2"]
        );
        assert_eq!(versions[1], v2.row);
        assert_eq!(catalog.list_versions("main").await.unwrap().len(), 3);

        // Deleting a version leaves its package in place.
        assert!(catalog.delete_version(v1.row.id).await.unwrap());
        assert!(!catalog.delete_version(v1.row.id).await.unwrap());
        assert!(catalog.delete_version(v2.row.id).await.unwrap());
        assert!(
            catalog
                .list_package_versions("main", "test-package")
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(catalog.list_packages("main").await.unwrap().len(), 2);

        // Deleting a channel takes everything under it.
        catalog
            .upsert_version(new_version("other-package", "1.1"))
            .await
            .unwrap();
        assert!(catalog.delete_channel("main").await.unwrap());
        assert!(!catalog.delete_channel("main").await.unwrap());
        assert_eq!(catalog.get_channel("main").await.unwrap(), None);
        assert!(catalog.list_packages("main").await.unwrap().is_empty());
        assert!(catalog.list_versions("main").await.unwrap().is_empty());
        assert!(catalog.list_members(first.row.id).await.unwrap().is_empty());
        assert!(catalog.list_channel_members("main").await.unwrap().is_empty());

        // The name is free again.
        catalog
            .create_channel(&ChannelDescriptor::public("main"), &bob, Role::Owner)
            .await
            .unwrap();
        assert!(catalog.list_packages("main").await.unwrap().is_empty());
    }
}
