//! In-memory storage implementation for testing.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{PalimpsestError, Result};
use crate::storage::traits::{
    DirEntry, FileMetadata, Storage, components_to_path, path_components,
};

/// An in-memory storage backend.
///
/// Files are kept in a map keyed by normalized path components and
/// directories in a companion set. Unlike a real filesystem, writing a file
/// creates its parent directories implicitly; the revision store creates
/// directories explicitly anyway, so both backends observe the same call
/// sequences.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<Vec<String>, Vec<u8>>,
    dirs: BTreeSet<Vec<String>>,
}

impl MemoryStorage {
    /// Create a new, empty memory storage.
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> usize {
        self.inner.lock().files.len()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl MemoryState {
    fn add_dirs(&mut self, components: &[String]) {
        for depth in 1..=components.len() {
            self.dirs.insert(components[..depth].to_vec());
        }
    }

    fn is_dir(&self, components: &[String]) -> bool {
        components.is_empty() || self.dirs.contains(components)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let components = path_components(path);
        self.inner.lock().add_dirs(&components);
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let components = path_components(path);
        let mut state = self.inner.lock();
        if components.len() > 1 {
            state.add_dirs(&components[..components.len() - 1]);
        }
        state.files.insert(components, data.to_vec());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let components = path_components(path);
        let state = self.inner.lock();
        state
            .files
            .get(&components)
            .cloned()
            .ok_or_else(|| PalimpsestError::not_found(path.display().to_string()))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let components = path_components(path);
        let state = self.inner.lock();

        if !state.is_dir(&components) {
            return Err(PalimpsestError::not_found(path.display().to_string()));
        }

        let mut entries = Vec::new();
        for dir in &state.dirs {
            if dir.len() == components.len() + 1 && dir.starts_with(&components) {
                entries.push(DirEntry {
                    name: dir[components.len()].clone(),
                    is_dir: true,
                });
            }
        }
        for file in state.files.keys() {
            if file.len() == components.len() + 1 && file.starts_with(&components) {
                entries.push(DirEntry {
                    name: file[components.len()].clone(),
                    is_dir: false,
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let components = path_components(path);
        let state = self.inner.lock();

        if let Some(data) = state.files.get(&components) {
            return Ok(FileMetadata {
                size: data.len() as u64,
                modified: now_secs(),
                is_dir: false,
            });
        }
        if state.is_dir(&components) {
            return Ok(FileMetadata {
                size: 0,
                modified: now_secs(),
                is_dir: true,
            });
        }

        Err(PalimpsestError::not_found(path.display().to_string()))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let components = path_components(path);
        let mut state = self.inner.lock();

        state.files.remove(&components);
        state
            .files
            .retain(|file, _| !file.starts_with(&components) || file.len() <= components.len());
        state
            .dirs
            .retain(|dir| !dir.starts_with(&components) || dir.len() < components.len());
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_components = path_components(from);
        let to_components = path_components(to);
        let mut state = self.inner.lock();

        if let Some(data) = state.files.remove(&from_components) {
            if to_components.len() > 1 {
                state.add_dirs(&to_components[..to_components.len() - 1]);
            }
            state.files.insert(to_components, data);
            return Ok(());
        }

        if state.dirs.contains(&from_components) {
            let moved: Vec<(Vec<String>, Vec<u8>)> = state
                .files
                .iter()
                .filter(|(file, _)| file.starts_with(&from_components))
                .map(|(file, data)| {
                    let mut renamed = to_components.clone();
                    renamed.extend_from_slice(&file[from_components.len()..]);
                    (renamed, data.clone())
                })
                .collect();
            state
                .files
                .retain(|file, _| !file.starts_with(&from_components));

            let moved_dirs: Vec<Vec<String>> = state
                .dirs
                .iter()
                .filter(|dir| dir.starts_with(&from_components))
                .map(|dir| {
                    let mut renamed = to_components.clone();
                    renamed.extend_from_slice(&dir[from_components.len()..]);
                    renamed
                })
                .collect();
            state.dirs.retain(|dir| !dir.starts_with(&from_components));

            for dir in moved_dirs {
                state.dirs.insert(dir);
            }
            for (file, data) in moved {
                state.files.insert(file, data);
            }
            return Ok(());
        }

        Err(PalimpsestError::not_found(
            components_to_path(&from_components).display().to_string(),
        ))
    }
}
