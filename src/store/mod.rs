//! Hierarchical JSON store the crawl output is written into.
//!
//! Values live in one JSON tree addressed by `/`-separated paths, e.g.
//! `courses/BU121/202309`. Path segments may not contain `.`, `$`, `#`,
//! `[` or `]`.

mod file;
mod memory;
mod writer;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use writer::{CatalogWriter, sanitize_key};

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']'];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store path {0:?}")]
    InvalidPath(String),
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to (de)serialize store contents")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Replace the value at `path`, creating intermediate objects as needed.
    async fn upsert(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// The value at `path`, or `None` if nothing is stored there.
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Persist pending writes. Stores without a backing medium do nothing.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Split and validate a store path.
pub(crate) fn segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() || segments.iter().any(|s| s.contains(FORBIDDEN_KEY_CHARS)) {
        return Err(StoreError::InvalidPath(path.to_owned()));
    }
    Ok(segments)
}
