use crate::store::{MemoryStore, Store, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A [`MemoryStore`] persisted to a single JSON file.
///
/// Writes only touch memory; call [`Store::flush`] to persist. The
/// file is replaced atomically so an interrupted flush leaves the previous
/// contents intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Load `path`, or start empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let inner = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => MemoryStore::new(),
            Ok(bytes) => MemoryStore::from_value(serde_json::from_slice::<Value>(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => MemoryStore::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn upsert(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.inner.upsert(path, value).await
    }

    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.inner.read(path).await
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&self.inner.snapshot().await)?;
        let tmp_path = self.path.with_extension("tmp");
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        tokio::fs::write(&tmp_path, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(io_err)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "store flushed");
        Ok(())
    }
}
