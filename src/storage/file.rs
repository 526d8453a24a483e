//! File-based storage implementation backed by `tokio::fs`.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::{PalimpsestError, Result};
use crate::storage::traits::{DirEntry, FileMetadata, Storage};

/// A storage backend that reads and writes the real filesystem.
///
/// Paths are used as given; the revision store and index derive them from a
/// project root, so one `FileStorage` instance can serve many projects.
#[derive(Debug, Default)]
pub struct FileStorage;

impl FileStorage {
    /// Create a new file storage.
    pub fn new() -> Self {
        FileStorage
    }
}

fn map_io(path: &Path, e: io::Error) -> PalimpsestError {
    if e.kind() == io::ErrorKind::NotFound {
        PalimpsestError::not_found(path.display().to_string())
    } else {
        PalimpsestError::Io(e)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        tokio::fs::write(path, data)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| map_io(path, e))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(path).await.map_err(|e| map_io(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| map_io(path, e))? {
            let file_type = entry.file_type().await.map_err(|e| map_io(path, e))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| map_io(path, e))?;

        let modified = metadata
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH)
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Ok(FileMetadata {
            size: metadata.len(),
            modified,
            is_dir: metadata.is_dir(),
        })
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(PalimpsestError::Io(e)),
        };

        if metadata.is_dir() {
            tokio::fs::remove_dir_all(path)
                .await
                .map_err(|e| map_io(path, e))
        } else {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| map_io(path, e))
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| map_io(from, e))
    }
}
