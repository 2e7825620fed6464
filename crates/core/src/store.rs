use crate::error::{IngestError, QueryError};
use crate::models::DocumentKey;
use crate::traits::VectorIndex;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const INDEX_FILE_SUFFIX: &str = ".pkl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// Another index already occupied the key; nothing was written.
    AlreadyExists,
}

/// Write-once persistence of serialized indexes, one file per document key.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &DocumentKey) -> PathBuf {
        self.root.join(format!("{}{INDEX_FILE_SUFFIX}", key.as_str()))
    }

    pub async fn exists(&self, key: &DocumentKey) -> io::Result<bool> {
        tokio::fs::try_exists(self.path_for(key)).await
    }

    /// Raw index bytes, or `None` when nothing has been stored for `key`.
    pub async fn read_bytes(&self, key: &DocumentKey) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub async fn load<I: VectorIndex>(&self, key: &DocumentKey) -> Result<I, QueryError> {
        let bytes = self
            .read_bytes(key)
            .await?
            .ok_or_else(|| QueryError::IndexNotFound {
                key: key.to_string(),
            })?;
        Ok(I::from_bytes(&bytes)?)
    }

    /// Persists `index` under `key` unless a file is already there.
    ///
    /// The bytes go to a temporary file in the same directory first and are
    /// linked into place without clobbering, so concurrent writers for one key
    /// leave exactly one complete index behind.
    pub async fn save_new<I: VectorIndex>(
        &self,
        key: &DocumentKey,
        index: &I,
    ) -> Result<SaveOutcome, IngestError> {
        let bytes = index.to_bytes()?;
        let root = self.root.clone();
        let target = self.path_for(key);

        let outcome = tokio::task::spawn_blocking(move || persist_no_clobber(&root, &target, &bytes))
            .await
            .map_err(io::Error::other)??;

        tracing::debug!(key = %key, ?outcome, "index persisted");
        Ok(outcome)
    }
}

fn persist_no_clobber(root: &Path, target: &Path, bytes: &[u8]) -> io::Result<SaveOutcome> {
    std::fs::create_dir_all(root)?;

    let mut staged = NamedTempFile::new_in(root)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;

    match staged.persist_noclobber(target) {
        Ok(_) => Ok(SaveOutcome::Written),
        Err(error) if error.error.kind() == io::ErrorKind::AlreadyExists => {
            Ok(SaveOutcome::AlreadyExists)
        }
        Err(error) => Err(error.error),
    }
}
