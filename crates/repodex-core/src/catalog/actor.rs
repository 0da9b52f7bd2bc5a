//! Catalog actor - thread-safe access to SQLite
//!
//! SQLite connections are not `Sync`, so the [`CatalogDb`] lives on a
//! dedicated background thread and async callers talk to it via message
//! passing. Each request carries a oneshot sender for its reply.

use std::fmt;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use repodex_schema::{
    Channel, ChannelDescriptor, Identity, Member, NewPackageVersion, Package, PackageVersion,
    Role,
};
use tokio::sync::oneshot;

use super::db::CatalogDb;
use super::{Catalog, CatalogError, Upsert};

type Job = Box<dyn FnOnce(&CatalogDb) + Send>;

/// Events that can be sent to the catalog actor
enum DbEvent {
    /// Run a query against the database and reply through the captured sender
    Call(Job),
    /// Shutdown the actor
    Shutdown,
}

impl fmt::Debug for DbEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(_) => f.debug_tuple("Call").finish_non_exhaustive(),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// A [`Catalog`] backed by SQLite, hosted on its own thread.
pub struct SqliteCatalog {
    sender: mpsc::Sender<DbEvent>,
}

impl fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCatalog").finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Open (or create) the catalog file at `path` and spawn its actor.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        Ok(Self::spawn(CatalogDb::open_at(path)?))
    }

    /// Spawn an actor over a private in-memory database.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Ok(Self::spawn(CatalogDb::open_in_memory()?))
    }

    fn spawn(db: CatalogDb) -> Self {
        let (sender, receiver) = mpsc::channel();

        thread::spawn(move || {
            run_db_event_loop(db, receiver);
        });

        Self { sender }
    }

    /// Helper to run a query on the actor thread and wait for the response
    async fn call<T, F>(&self, f: F) -> Result<T, CatalogError>
    where
        T: Send + 'static,
        F: FnOnce(&CatalogDb) -> Result<T, CatalogError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |db| {
            let _ = tx.send(f(db));
        });
        self.sender
            .send(DbEvent::Call(job))
            .map_err(|_| CatalogError::ActorDied)?;
        rx.await.map_err(|_| CatalogError::ActorDied)?
    }
}

impl Drop for SqliteCatalog {
    fn drop(&mut self) {
        let _ = self.sender.send(DbEvent::Shutdown);
    }
}

/// The actual event loop running in the background thread
// The db and receiver are intentionally moved into this thread to ensure
// exclusive ownership for the actor pattern.
#[allow(clippy::needless_pass_by_value)]
fn run_db_event_loop(db: CatalogDb, receiver: mpsc::Receiver<DbEvent>) {
    while let Ok(event) = receiver.recv() {
        match event {
            DbEvent::Call(job) => job(&db),
            DbEvent::Shutdown => break,
        }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn create_channel(
        &self,
        descriptor: &ChannelDescriptor,
        owner: &Identity,
        role: Role,
    ) -> Result<Channel, CatalogError> {
        let descriptor = descriptor.clone();
        let owner = owner.clone();
        self.call(move |db| db.create_channel(&descriptor, &owner, role))
            .await
    }

    async fn get_channel(&self, name: &str) -> Result<Option<Channel>, CatalogError> {
        let name = name.to_string();
        self.call(move |db| db.get_channel(&name)).await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, CatalogError> {
        self.call(CatalogDb::list_channels).await
    }

    async fn list_channel_members(
        &self,
        channel: &str,
    ) -> Result<Vec<(Identity, Role)>, CatalogError> {
        let channel = channel.to_string();
        self.call(move |db| db.list_channel_members(&channel)).await
    }

    async fn upsert_package(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Upsert<Package>, CatalogError> {
        let channel = channel.to_string();
        let name = name.to_string();
        self.call(move |db| db.upsert_package(&channel, &name))
            .await
    }

    async fn list_packages(&self, channel: &str) -> Result<Vec<Package>, CatalogError> {
        let channel = channel.to_string();
        self.call(move |db| db.list_packages(&channel)).await
    }

    async fn attach_member(
        &self,
        package_id: i64,
        identity: &Identity,
        role: Role,
    ) -> Result<Upsert<Member>, CatalogError> {
        let identity = identity.clone();
        self.call(move |db| db.attach_member(package_id, &identity, role))
            .await
    }

    async fn list_members(&self, package_id: i64) -> Result<Vec<Member>, CatalogError> {
        self.call(move |db| db.list_members(package_id)).await
    }

    async fn upsert_version(
        &self,
        version: NewPackageVersion,
    ) -> Result<Upsert<PackageVersion>, CatalogError> {
        self.call(move |db| db.upsert_version(&version)).await
    }

    async fn list_versions(&self, channel: &str) -> Result<Vec<PackageVersion>, CatalogError> {
        let channel = channel.to_string();
        self.call(move |db| db.list_versions(&channel)).await
    }

    async fn delete_version(&self, id: i64) -> Result<bool, CatalogError> {
        self.call(move |db| db.delete_version(id)).await
    }

    async fn delete_channel(&self, name: &str) -> Result<bool, CatalogError> {
        let name = name.to_string();
        self.call(move |db| db.delete_channel(&name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_catalog_conformance() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        super::super::conformance::run(&catalog).await;
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_connection() {
        let dir = tempdir().unwrap();
        let catalog = std::sync::Arc::new(SqliteCatalog::open(&dir.path().join("c.db")).unwrap());
        catalog
            .create_channel(
                &ChannelDescriptor::public("main"),
                &Identity::from("alice"),
                Role::Owner,
            )
            .await
            .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let catalog = catalog.clone();
                tokio::spawn(async move {
                    catalog
                        .upsert_package("main", &format!("pkg-{}", i % 4))
                        .await
                        .unwrap()
                })
            })
            .collect();
        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 4);
        assert_eq!(catalog.list_packages("main").await.unwrap().len(), 4);
    }
}
