//! Per-job temporary copies of uploaded images.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::StorageError;
use crate::sanitize::{redact_path, safe_file_name};

#[derive(Debug, Clone)]
pub struct TempUploads {
    dir: PathBuf,
}

impl TempUploads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `content` under a fresh unique name that keeps the upload's extension.
    pub async fn store(&self, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::UploadDir {
                path: self.dir.clone(),
                source: e,
            })?;

        let name = format!("upload_{}_{}", Uuid::new_v4().simple(), safe_file_name(filename));
        let path = self.dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StorageError::Write {
                path: path.clone(),
                source: e,
            })?;

        tracing::debug!(file = %redact_path(&path), bytes = content.len(), "Stored upload");
        Ok(path)
    }

    /// Deletes a stored upload. A file that is already gone is not an error.
    pub async fn remove(&self, path: &Path) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Remove {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}
