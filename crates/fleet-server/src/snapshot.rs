//! The single shared snapshot: the most recently pushed collection payload.
//!
//! Last write wins. The in-memory value is swapped as a whole `Bytes`, so a
//! concurrent pull sees either the old or the new payload, never a mix.
//! When a path is configured, every replace is also written to disk
//! (temp file + rename) and the file is reloaded on the next start.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use fleet_protocol::wire_types::EMPTY_COLLECTION;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Bytes>>,
    path: Option<PathBuf>,
    // Serializes disk writes; each write stores whatever is current then.
    persist_lock: Mutex<()>,
}

impl SnapshotStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store backed by `path`, loading the previous snapshot if the
    /// file exists. `None` behaves like [`SnapshotStore::in_memory`].
    pub async fn open(path: Option<PathBuf>) -> io::Result<Self> {
        let current = match &path {
            Some(path) => load(path).await?,
            None => None,
        };

        Ok(Self {
            current: RwLock::new(current),
            path,
            persist_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the snapshot with `payload`, then persist it.
    ///
    /// The in-memory value is updated first, so pulls see the new payload
    /// even if the disk write fails.
    pub async fn replace(&self, payload: Bytes) -> io::Result<()> {
        {
            let mut guard = self.current.write().await;
            *guard = Some(payload);
        }
        self.persist().await
    }

    /// The stored payload, if anything has been pushed (or loaded).
    pub async fn current(&self) -> Option<Bytes> {
        self.current.read().await.clone()
    }

    /// The stored payload, or the empty-list payload if there is none.
    pub async fn current_or_empty(&self) -> Bytes {
        self.current()
            .await
            .unwrap_or_else(|| Bytes::from_static(EMPTY_COLLECTION))
    }

    async fn persist(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.persist_lock.lock().await;
        let Some(latest) = self.current().await else {
            return Ok(());
        };

        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, &latest).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), bytes = latest.len(), "snapshot persisted");
        Ok(())
    }
}

async fn load(path: &Path) -> io::Result<Option<Bytes>> {
    match tokio::fs::read(path).await {
        Ok(data) if data.is_empty() => Ok(None),
        Ok(data) => {
            info!(path = %path.display(), bytes = data.len(), "loaded stored snapshot");
            Ok(Some(Bytes::from(data)))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
