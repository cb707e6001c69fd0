//! Single-file JSON index store

use super::{Index, IndexStore};
use crate::error::{Result, RetrievalError};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Keeps the index as one pretty-printed JSON document at `path`.
///
/// Saves go to a temporary file in the target's directory which is then
/// renamed over the target, so a crash mid-write leaves the previous index
/// intact and a concurrent reader sees either the old or the new document.
#[derive(Debug, Clone)]
pub struct JsonIndexStore {
    path: PathBuf,
}

impl JsonIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| RetrievalError::io(&parent, e))?;

    let mut temp = NamedTempFile::new_in(&parent).map_err(|e| RetrievalError::io(&parent, e))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| RetrievalError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| RetrievalError::io(path, e.error))?;
    Ok(())
}

#[async_trait]
impl IndexStore for JsonIndexStore {
    async fn save(&self, index: &Index) -> Result<()> {
        // JSON has no NaN or infinity, and a short vector would fail the next load.
        if let Some(reason) = index
            .dimension_mismatch()
            .or_else(|| index.non_finite_embedding())
        {
            return Err(RetrievalError::corrupt(
                &self.path,
                format!("refusing to save: {reason}"),
            ));
        }

        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| RetrievalError::io(&self.path, std::io::Error::other(e)))?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| RetrievalError::io(&self.path, std::io::Error::other(e)))??;

        info!(
            "Saved index with {} records to {}",
            index.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn load(&self) -> Result<Index> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RetrievalError::IndexNotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(RetrievalError::io(&self.path, e)),
        };

        let index: Index = serde_json::from_slice(&bytes)
            .map_err(|e| RetrievalError::corrupt(&self.path, e.to_string()))?;
        if let Some(reason) = index.dimension_mismatch() {
            return Err(RetrievalError::corrupt(&self.path, reason));
        }

        debug!(
            "Loaded index with {} records ({} dims) from {}",
            index.len(),
            index.dimension,
            self.path.display()
        );
        Ok(index)
    }

    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}
