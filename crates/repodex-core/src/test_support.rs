//! Fixtures shared by unit tests.

use std::path::Path;
use std::sync::Arc;

use opendal::Operator;
use opendal::services::Fs;
use tempfile::TempDir;

use crate::catalog::MemoryCatalog;
use crate::reconciler::Reconciler;
use crate::reporter::recording::RecordingReporter;
use crate::store::{OpendalStore, PackageStore};

pub(crate) fn fs_store(dir: &TempDir) -> OpendalStore {
    let mut builder = Fs::default();
    builder.root(dir.path().to_str().unwrap());
    OpendalStore::new(Operator::new(builder).unwrap().finish())
}

pub(crate) struct Harness {
    dir: TempDir,
    pub(crate) store: Arc<OpendalStore>,
    pub(crate) catalog: Arc<MemoryCatalog>,
    pub(crate) reporter: Arc<RecordingReporter>,
    pub(crate) reconciler: Reconciler,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(fs_store(&dir));
        let catalog = Arc::new(MemoryCatalog::new());
        let reporter = Arc::new(RecordingReporter::default());
        let reconciler = Reconciler::new(store.clone(), catalog.clone())
            .with_reporter(reporter.clone());
        Self {
            dir,
            store,
            catalog,
            reporter,
            reconciler,
        }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) async fn put(&self, channel: &str, path: &str, content: &[u8]) {
        self.store.create_channel(channel).await.unwrap();
        self.store
            .add_object(content.to_vec(), channel, path)
            .await
            .unwrap();
    }

    pub(crate) async fn repodata(&self, channel: &str, subdir: &str) -> repodex_schema::RepoData {
        let bytes = self
            .store
            .read_object(channel, &format!("{subdir}/repodata.json"))
            .await
            .unwrap();
        repodex_schema::RepoData::from_slice(&bytes).unwrap()
    }
}
