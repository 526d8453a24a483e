//! Storage abstraction trait and common types.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Metadata for a single path in storage.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// Size in bytes (0 for directories).
    pub size: u64,

    /// Last modified time (seconds since epoch).
    pub modified: u64,

    /// Whether the path is a directory.
    pub is_dir: bool,
}

/// One entry returned by [`Storage::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File or directory name, without any leading path.
    pub name: String,

    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// A trait for storage backends that persist the revision and index state.
///
/// This is the single point of mutation for everything the crate writes:
/// revision blobs, revision metadata, canonical pointers, and the inverted
/// index document all go through an implementation of this trait. Backends
/// are injected at construction time, so the same code runs against a real
/// filesystem ([`FileStorage`]) or an in-memory map ([`MemoryStorage`]).
///
/// Missing paths are reported as a not-found error (see
/// [`PalimpsestError::is_not_found`]); callers decide whether absence is an
/// empty result or a failure.
///
/// [`FileStorage`]: crate::storage::FileStorage
/// [`MemoryStorage`]: crate::storage::MemoryStorage
/// [`PalimpsestError::is_not_found`]: crate::error::PalimpsestError::is_not_found
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Create a directory and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Write a file, replacing any existing content.
    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Read a file's full contents.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// List the entries of a directory.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Get metadata for a path.
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Remove a file or directory tree. Missing paths are not an error.
    async fn remove(&self, path: &Path) -> Result<()>;

    /// Rename a path. Replaces the destination if it is an existing file.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Normalize a path into its component names.
///
/// Used by [`MemoryStorage`] to key its file map consistently regardless of
/// platform separators or redundant `.` components.
///
/// [`MemoryStorage`]: crate::storage::MemoryStorage
pub(crate) fn path_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Rebuild a displayable path from components, for error messages.
pub(crate) fn components_to_path(components: &[String]) -> PathBuf {
    components.iter().collect()
}
