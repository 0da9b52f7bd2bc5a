//! Package store access.
//!
//! Layout: `<channel>/<platform>/<filename>` - one namespace per channel,
//! one directory per platform subdirectory, archives and `repodata.json`
//! side by side.

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};

/// An object found while listing a channel namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreObject {
    /// Path relative to the channel namespace (e.g. `linux-64/foo-1.0-0.tar.bz2`).
    pub path: String,
    /// Live size in bytes.
    pub size: u64,
}

/// A failed store operation.
#[derive(thiserror::Error, Debug)]
#[error("{op} '{target}': {source}")]
pub struct StoreError {
    op: &'static str,
    target: String,
    #[source]
    source: opendal::Error,
}

impl StoreError {
    fn new(op: &'static str, target: impl Into<String>, source: opendal::Error) -> Self {
        Self {
            op,
            target: target.into(),
            source,
        }
    }

    /// The underlying opendal error kind.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Object storage keyed by channel namespace and path.
///
/// Writes are expected to replace whole objects: a concurrent reader sees
/// either the previous content or the new content, never a prefix.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Ensure the namespace for `channel` exists. Idempotent.
    async fn create_channel(&self, channel: &str) -> Result<(), StoreError>;

    /// Whether a namespace for `channel` exists.
    async fn channel_exists(&self, channel: &str) -> Result<bool, StoreError>;

    /// All channel namespaces, sorted by name.
    async fn list_channels(&self) -> Result<Vec<String>, StoreError>;

    /// All objects in a channel, sorted by path. Only the channel root and
    /// its immediate subdirectories are listed.
    async fn list_objects(&self, channel: &str) -> Result<Vec<StoreObject>, StoreError>;

    /// Write (or overwrite) `path` inside `channel`.
    async fn add_object(&self, content: Vec<u8>, channel: &str, path: &str)
    -> Result<(), StoreError>;

    /// Remove `path` from `channel`. Removing a missing object is not an error.
    async fn delete_object(&self, channel: &str, path: &str) -> Result<(), StoreError>;

    /// Read the full content of `path`.
    async fn read_object(&self, channel: &str, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Live size of `path` without reading it, or `None` if it does not exist.
    async fn object_size(&self, channel: &str, path: &str) -> Result<Option<u64>, StoreError>;
}

/// [`PackageStore`] over any opendal backend (local fs, S3/R2, memory).
#[derive(Debug, Clone)]
pub struct OpendalStore {
    op: Operator,
}

impl OpendalStore {
    /// Wrap an already-configured operator.
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    /// The underlying operator.
    pub fn operator(&self) -> &Operator {
        &self.op
    }

    fn key(channel: &str, path: &str) -> String {
        format!("{channel}/{}", path.trim_start_matches('/'))
    }

    /// Entries directly under `dir`, excluding `dir` itself.
    async fn children(&self, dir: &str) -> Result<Vec<opendal::Entry>, StoreError> {
        let entries = self
            .op
            .list(dir)
            .await
            .map_err(|e| StoreError::new("list", dir, e))?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.path() != dir && !entry.name().is_empty())
            .collect())
    }

    async fn stat_size(&self, key: &str) -> Result<Option<u64>, StoreError> {
        match self.op.stat(key).await {
            Ok(meta) => Ok(Some(meta.content_length())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::new("stat", key, e)),
        }
    }
}

#[async_trait]
impl PackageStore for OpendalStore {
    async fn create_channel(&self, channel: &str) -> Result<(), StoreError> {
        let dir = format!("{channel}/");
        self.op
            .create_dir(&dir)
            .await
            .map_err(|e| StoreError::new("create", dir, e))
    }

    async fn channel_exists(&self, channel: &str) -> Result<bool, StoreError> {
        let dir = format!("{channel}/");
        match self.op.stat(&dir).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::new("stat", dir, e)),
        }
    }

    async fn list_channels(&self) -> Result<Vec<String>, StoreError> {
        let mut channels: Vec<String> = self
            .children("/")
            .await?
            .into_iter()
            .filter(|entry| entry.metadata().mode().is_dir())
            .map(|entry| entry.name().trim_end_matches('/').to_string())
            .filter(|name| !name.is_empty() && !name.starts_with('.'))
            .collect();
        channels.sort();
        channels.dedup();
        Ok(channels)
    }

    async fn list_objects(&self, channel: &str) -> Result<Vec<StoreObject>, StoreError> {
        let root = format!("{channel}/");
        let mut objects = Vec::new();

        for entry in self.children(&root).await? {
            if entry.metadata().mode().is_dir() {
                for child in self.children(entry.path()).await? {
                    if child.metadata().mode().is_file() {
                        objects.push(child.path().to_string());
                    }
                }
            } else if entry.metadata().mode().is_file() {
                objects.push(entry.path().to_string());
            }
        }

        let mut listed = Vec::with_capacity(objects.len());
        for key in objects {
            // Deleted between list and stat: treat as never listed.
            let Some(size) = self.stat_size(&key).await? else {
                continue;
            };
            let path = key.strip_prefix(&root).unwrap_or(&key).to_string();
            listed.push(StoreObject { path, size });
        }
        listed.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listed)
    }

    async fn add_object(
        &self,
        content: Vec<u8>,
        channel: &str,
        path: &str,
    ) -> Result<(), StoreError> {
        let key = Self::key(channel, path);
        self.op
            .write(&key, content)
            .await
            .map_err(|e| StoreError::new("write", key, e))?;
        Ok(())
    }

    async fn delete_object(&self, channel: &str, path: &str) -> Result<(), StoreError> {
        let key = Self::key(channel, path);
        self.op
            .delete(&key)
            .await
            .map_err(|e| StoreError::new("delete", key, e))
    }

    async fn read_object(&self, channel: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        let key = Self::key(channel, path);
        let data = self
            .op
            .read(&key)
            .await
            .map_err(|e| StoreError::new("read", key, e))?;
        Ok(data.to_vec())
    }

    async fn object_size(&self, channel: &str, path: &str) -> Result<Option<u64>, StoreError> {
        self.stat_size(&Self::key(channel, path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fs_store;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_channels_and_objects() {
        let dir = TempDir::new().unwrap();
        let store = fs_store(&dir);

        store.create_channel("alpha").await.unwrap();
        store.create_channel("beta").await.unwrap();
        store
            .add_object(b"abc".to_vec(), "alpha", "linux-64/a-1-0.tar.bz2")
            .await
            .unwrap();
        store
            .add_object(b"hello".to_vec(), "alpha", "noarch/b-1-0.conda")
            .await
            .unwrap();

        assert_eq!(store.list_channels().await.unwrap(), vec!["alpha", "beta"]);
        assert!(store.channel_exists("alpha").await.unwrap());
        assert!(!store.channel_exists("gamma").await.unwrap());

        let objects = store.list_objects("alpha").await.unwrap();
        assert_eq!(
            objects,
            vec![
                StoreObject {
                    path: "linux-64/a-1-0.tar.bz2".to_string(),
                    size: 3
                },
                StoreObject {
                    path: "noarch/b-1-0.conda".to_string(),
                    size: 5
                },
            ]
        );
        assert!(store.list_objects("beta").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_size_lookup_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = fs_store(&dir);

        store
            .add_object(b"12345".to_vec(), "main", "linux-64/x-1-0.tar.bz2")
            .await
            .unwrap();
        assert_eq!(
            store
                .object_size("main", "linux-64/x-1-0.tar.bz2")
                .await
                .unwrap(),
            Some(5)
        );
        assert_eq!(
            store.read_object("main", "linux-64/x-1-0.tar.bz2").await.unwrap(),
            b"12345"
        );

        store
            .delete_object("main", "linux-64/x-1-0.tar.bz2")
            .await
            .unwrap();
        assert_eq!(
            store
                .object_size("main", "linux-64/x-1-0.tar.bz2")
                .await
                .unwrap(),
            None
        );
        // Deleting twice is fine.
        store
            .delete_object("main", "linux-64/x-1-0.tar.bz2")
            .await
            .unwrap();
    }
}
