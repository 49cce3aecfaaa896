use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::snapshot::ProgressSnapshot;
use crate::DocumentId;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode progress file {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode progress for document {id}")]
    Encode {
        id: DocumentId,
        #[source]
        source: serde_json::Error,
    },
}

impl RepositoryError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Storage for progress snapshots.
///
/// `save_progress` is an upsert keyed by `document_id` that overwrites every
/// field, optional payloads included. Saves may race; implementations keep the
/// snapshot with the highest revision.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn load_progress(
        &self,
        document_id: DocumentId,
    ) -> Result<Option<ProgressSnapshot>, RepositoryError>;

    async fn find_progress(
        &self,
        source_key: &str,
    ) -> Result<Option<ProgressSnapshot>, RepositoryError>;

    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), RepositoryError>;
}

/// Keeps one JSON file per document under `root`.
pub struct FileProgressRepository {
    root: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileProgressRepository {
    pub fn new(root: PathBuf) -> Result<Self, RepositoryError> {
        std::fs::create_dir_all(&root).map_err(|err| RepositoryError::io(&root, err))?;
        Ok(Self {
            root,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, document_id: DocumentId) -> PathBuf {
        self.root.join(format!("{}.json", document_id))
    }

    async fn read_snapshot(path: &Path) -> Result<Option<ProgressSnapshot>, RepositoryError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RepositoryError::io(path, err)),
        };
        let snapshot = serde_json::from_str(&raw).map_err(|source| RepositoryError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(snapshot))
    }
}

#[async_trait]
impl ProgressRepository for FileProgressRepository {
    #[instrument(skip(self))]
    async fn load_progress(
        &self,
        document_id: DocumentId,
    ) -> Result<Option<ProgressSnapshot>, RepositoryError> {
        Self::read_snapshot(&self.snapshot_path(document_id)).await
    }

    #[instrument(skip(self))]
    async fn find_progress(
        &self,
        source_key: &str,
    ) -> Result<Option<ProgressSnapshot>, RepositoryError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|err| RepositoryError::io(&self.root, err))?;

        let mut best: Option<ProgressSnapshot> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| RepositoryError::io(&self.root, err))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_snapshot(&path).await {
                Ok(Some(snapshot)) if snapshot.source_key.as_deref() == Some(source_key) => {
                    if best.as_ref().map_or(true, |kept| snapshot.revision > kept.revision) {
                        best = Some(snapshot);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(?err, path = %path.display(), "skipping unreadable progress file");
                }
            }
        }
        Ok(best)
    }

    #[instrument(skip(self, snapshot), fields(document = %snapshot.document_id, revision = snapshot.revision))]
    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let path = self.snapshot_path(snapshot.document_id);

        match Self::read_snapshot(&path).await {
            Ok(Some(stored)) if !snapshot.supersedes(&stored) => {
                debug!(stored = stored.revision, "ignoring stale progress save");
                return Ok(());
            }
            Ok(_) => {}
            Err(err) => warn!(?err, "overwriting unreadable progress file"),
        }

        let payload =
            serde_json::to_string_pretty(snapshot).map_err(|source| RepositoryError::Encode {
                id: snapshot.document_id,
                source,
            })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, payload.as_bytes())
            .await
            .map_err(|err| RepositoryError::io(&tmp, err))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|err| RepositoryError::io(&path, err))?;
        Ok(())
    }
}

pub struct MemoryProgressRepository {
    inner: Mutex<HashMap<DocumentId, ProgressSnapshot>>,
}

impl MemoryProgressRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for MemoryProgressRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressRepository for MemoryProgressRepository {
    async fn load_progress(
        &self,
        document_id: DocumentId,
    ) -> Result<Option<ProgressSnapshot>, RepositoryError> {
        Ok(self.inner.lock().get(&document_id).cloned())
    }

    async fn find_progress(
        &self,
        source_key: &str,
    ) -> Result<Option<ProgressSnapshot>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .values()
            .filter(|snapshot| snapshot.source_key.as_deref() == Some(source_key))
            .max_by_key(|snapshot| snapshot.revision)
            .cloned())
    }

    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        let stale = inner
            .get(&snapshot.document_id)
            .is_some_and(|stored| !snapshot.supersedes(stored));
        if !stale {
            inner.insert(snapshot.document_id, snapshot.clone());
        }
        Ok(())
    }
}
